pub mod support;

mod normalizer_tests;
mod reconcile_tests;
