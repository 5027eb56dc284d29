use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// ネットワーク呼び出しの前に弾く入力エラーの理由。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ValidationFailureKind {
    /// 汎用的なバリデーションエラー。
    Generic,
    /// 必須フィールドが空。
    RequiredField,
    /// 文字数の上限を超過。
    TooLong,
    /// メールアドレスの形式が不正。
    InvalidEmail,
    /// パスワードが短すぎる。
    PasswordTooShort,
    /// パスワード確認が一致しない。
    PasswordMismatch,
    /// コレクション名や ID の形式が不正。
    InvalidIdentifier,
}

impl ValidationFailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationFailureKind::Generic => "generic",
            ValidationFailureKind::RequiredField => "required_field",
            ValidationFailureKind::TooLong => "too_long",
            ValidationFailureKind::InvalidEmail => "invalid_email",
            ValidationFailureKind::PasswordTooShort => "password_too_short",
            ValidationFailureKind::PasswordMismatch => "password_mismatch",
            ValidationFailureKind::InvalidIdentifier => "invalid_identifier",
        }
    }
}

impl fmt::Display for ValidationFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValidationFailureKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generic" => Ok(ValidationFailureKind::Generic),
            "required_field" => Ok(ValidationFailureKind::RequiredField),
            "too_long" => Ok(ValidationFailureKind::TooLong),
            "invalid_email" => Ok(ValidationFailureKind::InvalidEmail),
            "password_too_short" => Ok(ValidationFailureKind::PasswordTooShort),
            "password_mismatch" => Ok(ValidationFailureKind::PasswordMismatch),
            "invalid_identifier" => Ok(ValidationFailureKind::InvalidIdentifier),
            _ => Err(()),
        }
    }
}
