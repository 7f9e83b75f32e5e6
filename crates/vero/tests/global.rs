//! The process-wide tracker. Kept in its own test binary so no other test
//! shares the global.

use vero::{Error, Tracker};

#[test]
fn test_global_lifecycle() {
    assert!(!vero::is_initialized());
    assert!(matches!(vero::tracker(), Err(Error::NotInitialized)));

    // a failed build leaves the global uninitialized
    assert!(matches!(vero::init(Tracker::builder("")), Err(Error::Config(_))));
    assert!(!vero::is_initialized());

    let tracker = vero::init(Tracker::builder("test-api-key")).unwrap();
    assert_eq!(tracker.config().tracking_api_key(), "test-api-key");
    assert!(vero::is_initialized());

    let again = vero::tracker().unwrap();
    assert!(std::ptr::eq(tracker, again));

    assert!(matches!(
        vero::init(Tracker::builder("other-key")),
        Err(Error::AlreadyInitialized)
    ));
    assert_eq!(vero::tracker().unwrap().config().tracking_api_key(), "test-api-key");
}
