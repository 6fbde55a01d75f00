//! Options read from the process environment.

use std::env;
use std::time::Duration;

use serial_test::serial;
use weft::config::{DEBUG_VAR, TIMEOUT_VAR};
use weft::Options;

fn clear() {
    env::remove_var(DEBUG_VAR);
    env::remove_var(TIMEOUT_VAR);
}

#[test]
#[serial]
fn test_defaults_when_unset() {
    clear();
    let options = Options::from_env();
    assert!(!options.is_debug());
    assert_eq!(options.timeout_duration(), None);
}

#[test]
#[serial]
fn test_reads_debug_and_timeout() {
    clear();
    env::set_var(DEBUG_VAR, "TRUE");
    env::set_var(TIMEOUT_VAR, "250");
    let options = Options::from_env();
    clear();
    assert!(options.is_debug());
    assert_eq!(options.timeout_duration(), Some(Duration::from_millis(250)));
}

#[test]
#[serial]
fn test_unparsable_values_are_ignored() {
    clear();
    env::set_var(DEBUG_VAR, "maybe");
    env::set_var(TIMEOUT_VAR, "soon");
    let options = Options::from_env();
    clear();
    assert_eq!(options, Options::default());
}
