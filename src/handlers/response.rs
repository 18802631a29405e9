//! Success envelope shared by every JSON endpoint.

use serde::Serialize;

/// `{"status":"success","message":...,"data":...}`
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: "success",
            message: None,
            data,
        }
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            status: "success",
            message: Some(message.into()),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_shape() {
        let body = serde_json::to_value(ApiResponse::success(vec![1, 2])).unwrap();
        assert_eq!(body, json!({"status": "success", "data": [1, 2]}));

        let body = serde_json::to_value(ApiResponse::with_message("Deleted.", ())).unwrap();
        assert_eq!(
            body,
            json!({"status": "success", "message": "Deleted.", "data": null})
        );
    }
}
