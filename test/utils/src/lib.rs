use serde_json::json;
use serde_json::Value;

/// Three monitors as the backend reports them: one healthy, one failing with
/// an AI analysis attached, and one that has never been checked.
pub fn monitors_fixture() -> Value {
    return json!([
        {
            "id": "6f1c2a9e-0001",
            "user_id": "user-1",
            "url": "https://api.example.com/health",
            "interval": 30_000_000_000_i64,
            "last_checked": "2024-03-01T12:00:00Z",
            "status_code": 200,
            "response_time": 87,
            "is_healthy": true,
            "is_running": true
        },
        {
            "id": "6f1c2a9e-0002",
            "user_id": "user-1",
            "url": "https://payments.example.com",
            "interval": 60_000_000_000_i64,
            "last_checked": "2024-03-01T11:58:00Z",
            "status_code": 503,
            "response_time": 1204,
            "is_healthy": false,
            "is_running": true,
            "ai_explanation": "The upstream returned 503 Service Unavailable.\nThe service is likely overloaded or in maintenance."
        },
        {
            "id": "6f1c2a9e-0003",
            "user_id": "user-1",
            "url": "https://new.example.com",
            "interval": 5_000_000_000_i64,
            "last_checked": "0001-01-01T00:00:00Z",
            "status_code": 0,
            "response_time": 0,
            "is_healthy": false,
            "is_running": false
        }
    ]);
}

pub fn monitor_list_body(monitors: Value) -> String {
    return json!({
        "success": true,
        "message": "monitors retrieved",
        "data": monitors,
    })
    .to_string();
}

pub fn login_body(token: &str) -> String {
    return json!({
        "success": true,
        "message": "login successful",
        "data": { "token": token },
    })
    .to_string();
}
