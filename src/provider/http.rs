//! プロバイダー共通の HTTP 応答処理
//!
//! どのプロバイダーも、失敗時は非 2xx ステータスかボディ内の
//! `{"error": {"message": ...}}` で通知してきます。ここで共通に
//! [`ProviderError::Api`] へ変換します。

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::ProviderKind;
use crate::error::ProviderError;

/// レスポンスボディを読み取り、エラーを検出した上で型付きの値に変換する
pub(crate) async fn read_json<T: DeserializeOwned>(
    provider: ProviderKind,
    response: reqwest::Response,
) -> Result<T, ProviderError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|source| ProviderError::Request { provider, source })?;

    let value: Option<Value> = serde_json::from_str(&body).ok();

    if let Some(message) = value.as_ref().and_then(error_message) {
        return Err(ProviderError::Api {
            provider,
            status: status.as_u16(),
            message,
        });
    }
    if !status.is_success() {
        return Err(ProviderError::Api {
            provider,
            status: status.as_u16(),
            message: format!("HTTP error! Status: {}", status.as_u16()),
        });
    }

    let value = value.ok_or_else(|| {
        ProviderError::InvalidResponse(format!("{provider} の応答が JSON ではありません: {body}"))
    })?;
    serde_json::from_value(value)
        .map_err(|e| ProviderError::InvalidResponse(format!("{provider} の応答形式が不正です: {e}")))
}

/// `error` フィールドからメッセージを取り出す
fn error_message(value: &Value) -> Option<String> {
    let error = value.get("error")?;
    if error.is_null() {
        return None;
    }
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string());
    Some(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_message() {
        let value = json!({"error": {"code": 400, "message": "API key not valid."}});
        assert_eq!(error_message(&value).as_deref(), Some("API key not valid."));

        let value = json!({"error": "quota"});
        assert_eq!(error_message(&value).as_deref(), Some("\"quota\""));

        assert_eq!(error_message(&json!({"error": null})), None);
        assert_eq!(error_message(&json!({"choices": []})), None);
    }
}
