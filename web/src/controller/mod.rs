use serde::Serialize;
pub(crate) mod count_controller;
pub(crate) mod db_version_controller;
pub(crate) mod graph_controller;
pub(crate) mod health_check_controller;
pub(crate) mod query_controller;
pub(crate) mod user_session_controller;

/// Success body shared by the JSON endpoints: `{"result": ...}`.
#[derive(Debug, Serialize)]
struct ApiResponse<T: Serialize> {
    result: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(result: T) -> Self {
        Self { result }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_serialize_api_response() {
        let response = ApiResponse::new(23);
        let serialized = serde_json::to_string(&response).unwrap();
        assert_eq!(serialized, json!({"result": 23}).to_string());
    }
}
