use std::ptr;

use super::*;

#[test]
fn rank_defaults_to_unidentified() {
    assert_eq!(rank_id(), -1);
    perflow_set_rank(5);
    assert_eq!(rank_id(), 5);
    set_rank_id(-1);
}

#[test]
fn null_handles_are_rejected() {
    unsafe {
        assert_eq!(
            perflow_init(ptr::null_mut(), 0, ptr::null()),
            PERFLOW_ERR_HANDLE
        );
        assert_eq!(perflow_start(ptr::null_mut()), PERFLOW_ERR_HANDLE);
        assert_eq!(perflow_stop(ptr::null_mut()), PERFLOW_ERR_HANDLE);
        assert_eq!(perflow_write_output(ptr::null_mut()), PERFLOW_ERR_HANDLE);
        assert_eq!(perflow_destroy(ptr::null_mut()), PERFLOW_ERR_HANDLE);
        assert_eq!(perflow_get_sample_count(ptr::null()), 0);
        assert_eq!(perflow_get_dropped_count(ptr::null()), 0);
    }
}

#[test]
fn lifecycle_errors_map_to_state_code() {
    let handle = perflow_create();
    unsafe {
        // Not initialized yet.
        assert_eq!(perflow_start(handle), PERFLOW_ERR_STATE);
        assert_eq!(perflow_stop(handle), PERFLOW_ERR_STATE);
        assert_eq!(perflow_get_sample_count(handle), 0);
        // Destroying an uninitialized handle is a clean no-op teardown.
        assert_eq!(perflow_destroy(handle), PERFLOW_OK);
    }
}
