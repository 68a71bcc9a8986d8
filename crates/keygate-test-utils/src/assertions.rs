use serde_json::Value;

/// Assert a 200 envelope with `success: true` and code `OK`.
pub fn assert_envelope_ok(status: u16, body: &Value) -> &Value {
    assert_eq!(status, 200, "Expected 200 OK, got {status}: {body}");
    assert_eq!(body["code"], "OK", "Expected code OK: {body}");
    assert_eq!(body["success"], true, "Expected success true: {body}");
    body
}

/// Assert a 200 envelope carrying the expected domain result code.
pub fn assert_envelope_code(status: u16, body: &Value, expected_code: &str) {
    assert_eq!(status, 200, "Expected 200 envelope, got {status}: {body}");
    assert_eq!(
        body["code"], expected_code,
        "Expected code '{expected_code}': {body}"
    );
    assert_eq!(
        body["success"],
        expected_code == "OK",
        "success flag disagrees with code: {body}"
    );
}
