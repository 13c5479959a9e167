use serde_json::{Number, Value};

use crate::flow::ValidationKind;

/// 未配置 errorMessage 时的默认提示
pub const DEFAULT_ERROR_MESSAGE: &str = "Invalid input, please try again.";

/// 用户输入校验器
pub struct InputValidator;

impl InputValidator {
    /// 校验原始输入；成功时返回待写入变量的值，失败时返回面向用户的提示文本
    pub fn validate(
        kind: ValidationKind,
        raw: &str,
        error_message: Option<&str>,
    ) -> std::result::Result<Value, String> {
        let message = || Self::error_text(error_message);
        let input = raw.trim();

        match kind {
            ValidationKind::None | ValidationKind::Text => {
                if input.is_empty() {
                    Err(message())
                } else {
                    Ok(Value::String(input.to_string()))
                }
            }
            ValidationKind::Number => Self::parse_number(input).ok_or_else(message),
            ValidationKind::Integer => input
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| message()),
            ValidationKind::Email => {
                if Self::is_email(input) {
                    Ok(Value::String(input.to_string()))
                } else {
                    Err(message())
                }
            }
        }
    }

    /// 步骤配置的 errorMessage，为空时使用默认提示
    pub fn error_text(error_message: Option<&str>) -> String {
        error_message
            .filter(|text| !text.trim().is_empty())
            .unwrap_or(DEFAULT_ERROR_MESSAGE)
            .to_string()
    }

    /// 整数值保存为整数，其余有限小数保存为浮点
    fn parse_number(input: &str) -> Option<Value> {
        if let Ok(integer) = input.parse::<i64>() {
            return Some(Value::from(integer));
        }
        let float = input.parse::<f64>().ok().filter(|value| value.is_finite())?;
        Number::from_f64(float).map(Value::Number)
    }

    /// 结构检查：local@domain，domain 中至少有一个非首尾的点
    pub fn is_email(input: &str) -> bool {
        if input.chars().any(char::is_whitespace) {
            return false;
        }
        let Some((local, domain)) = input.split_once('@') else {
            return false;
        };
        if local.is_empty() || domain.contains('@') {
            return false;
        }
        domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
            && !domain.contains("..")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_number() {
        assert_eq!(
            InputValidator::validate(ValidationKind::Number, " 42 ", None),
            Ok(json!(42))
        );
        assert_eq!(
            InputValidator::validate(ValidationKind::Number, "19.5", None),
            Ok(json!(19.5))
        );
        assert_eq!(
            InputValidator::validate(ValidationKind::Number, "not-a-number", Some("Numbers only")),
            Err("Numbers only".to_string())
        );
        assert!(InputValidator::validate(ValidationKind::Number, "NaN", None).is_err());
        assert!(InputValidator::validate(ValidationKind::Number, "inf", None).is_err());
    }

    #[test]
    fn test_validate_integer() {
        assert_eq!(
            InputValidator::validate(ValidationKind::Integer, "7", None),
            Ok(json!(7))
        );
        assert!(InputValidator::validate(ValidationKind::Integer, "7.5", None).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(InputValidator::is_email("anna@example.com"));
        assert!(InputValidator::is_email("a.b+c@mail.example.org"));
        assert!(!InputValidator::is_email("anna@localhost"));
        assert!(!InputValidator::is_email("@example.com"));
        assert!(!InputValidator::is_email("anna@.com"));
        assert!(!InputValidator::is_email("anna@example."));
        assert!(!InputValidator::is_email("an na@example.com"));
        assert!(!InputValidator::is_email("a@b@example.com"));
    }

    #[test]
    fn test_validate_none_requires_content() {
        assert_eq!(
            InputValidator::validate(ValidationKind::None, "  Acme GmbH ", None),
            Ok(json!("Acme GmbH"))
        );
        assert_eq!(
            InputValidator::validate(ValidationKind::None, "   ", None),
            Err(DEFAULT_ERROR_MESSAGE.to_string())
        );
    }

    #[test]
    fn test_blank_error_message_uses_fallback() {
        assert_eq!(
            InputValidator::validate(ValidationKind::Email, "nope", Some("  ")),
            Err(DEFAULT_ERROR_MESSAGE.to_string())
        );
    }
}
