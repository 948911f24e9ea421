// src/api/types.rs
use serde::{Deserialize, Serialize};

use crate::{Currency, TransferTxParams, ValidationError};

pub const MIN_PAGE_SIZE: i64 = 5;
pub const MAX_PAGE_SIZE: i64 = 10;

/// Unified response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// 0 on success
    pub code: i32,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: error_codes::SUCCESS,
            msg: "ok".to_string(),
            data: Some(data),
        }
    }

    pub fn error(code: i32, msg: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            code,
            msg: msg.into(),
            data: None,
        }
    }
}

pub mod error_codes {
    pub const SUCCESS: i32 = 0;

    // Client errors (1xxx)
    pub const INVALID_PARAMETER: i32 = 1001;

    // Resource errors (4xxx)
    pub const NOT_FOUND: i32 = 4001;
    pub const CONFLICT: i32 = 4091;

    // Server errors (5xxx)
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const SERVICE_UNAVAILABLE: i32 = 5001;
    pub const DEADLINE_EXCEEDED: i32 = 5004;
}

fn at_least(field: &'static str, min: i64, actual: i64) -> Result<i64, ValidationError> {
    if actual < min {
        return Err(ValidationError::TooSmall { field, min, actual });
    }
    Ok(actual)
}

pub fn validate_id(field: &'static str, id: i64) -> Result<i64, ValidationError> {
    at_least(field, 1, id)
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAccountRequest {
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub currency: String,
}

impl CreateAccountRequest {
    pub fn validate(&self) -> Result<(String, Currency), ValidationError> {
        let owner = self.owner.trim();
        if owner.is_empty() {
            return Err(ValidationError::Missing("owner"));
        }
        if self.currency.is_empty() {
            return Err(ValidationError::Missing("currency"));
        }
        let currency = self.currency.parse()?;
        Ok((owner.to_string(), currency))
    }
}

/// `page_id` starts at 1; `page_size` is bounded.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageQuery {
    pub page_id: i64,
    pub page_size: i64,
}

impl PageQuery {
    /// Returns `(limit, offset)`.
    pub fn validate(&self) -> Result<(i64, i64), ValidationError> {
        let page_id = at_least("page_id", 1, self.page_id)?;
        if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(ValidationError::OutOfRange {
                field: "page_size",
                min: MIN_PAGE_SIZE,
                max: MAX_PAGE_SIZE,
                actual: self.page_size,
            });
        }
        let offset = (page_id - 1).checked_mul(self.page_size).ok_or(
            ValidationError::TooLarge {
                field: "page_id",
                max: i64::MAX / self.page_size + 1,
                actual: page_id,
            },
        )?;
        Ok((self.page_size, offset))
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ListTransfersQuery {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub page_id: i64,
    pub page_size: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferRequest {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
    #[serde(default)]
    pub currency: String,
}

impl TransferRequest {
    /// Shape checks only; account existence and currency are checked
    /// against the store by the handler.
    pub fn validate(&self) -> Result<(TransferTxParams, Currency), ValidationError> {
        validate_id("from_account_id", self.from_account_id)?;
        validate_id("to_account_id", self.to_account_id)?;
        if self.from_account_id == self.to_account_id {
            return Err(ValidationError::SameAccount(self.from_account_id));
        }
        at_least("amount", 1, self.amount)?;
        if self.currency.is_empty() {
            return Err(ValidationError::Missing("currency"));
        }
        let currency = self.currency.parse()?;

        Ok((
            TransferTxParams {
                from_account_id: self.from_account_id,
                to_account_id: self.to_account_id,
                amount: self.amount,
            },
            currency,
        ))
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer(from: i64, to: i64, amount: i64, currency: &str) -> TransferRequest {
        TransferRequest {
            from_account_id: from,
            to_account_id: to,
            amount,
            currency: currency.to_string(),
        }
    }

    #[test]
    fn test_page_query_bounds() {
        let ok = PageQuery {
            page_id: 3,
            page_size: 5,
        };
        assert_eq!(ok.validate().unwrap(), (5, 10));

        let zero_page = PageQuery {
            page_id: 0,
            page_size: 5,
        };
        assert!(matches!(
            zero_page.validate(),
            Err(ValidationError::TooSmall {
                field: "page_id",
                ..
            })
        ));

        let past_end = PageQuery {
            page_id: i64::MAX,
            page_size: 10,
        };
        assert_eq!(
            past_end.validate().unwrap_err(),
            ValidationError::TooLarge {
                field: "page_id",
                max: i64::MAX / 10 + 1,
                actual: i64::MAX,
            }
        );

        let last_page = PageQuery {
            page_id: i64::MAX / 10 + 1,
            page_size: 10,
        };
        assert_eq!(last_page.validate().unwrap().1, i64::MAX / 10 * 10);

        for page_size in [4, 11] {
            let bad = PageQuery {
                page_id: 1,
                page_size,
            };
            assert!(matches!(
                bad.validate(),
                Err(ValidationError::OutOfRange { .. })
            ));
        }
    }

    #[test]
    fn test_transfer_request_validation() {
        let (params, currency) = transfer(1, 2, 10, "USD").validate().unwrap();
        assert_eq!(params.amount, 10);
        assert_eq!(currency, Currency::USD);

        assert_eq!(
            transfer(2, 2, 10, "USD").validate().unwrap_err(),
            ValidationError::SameAccount(2)
        );
        assert!(matches!(
            transfer(0, 2, 10, "USD").validate(),
            Err(ValidationError::TooSmall {
                field: "from_account_id",
                ..
            })
        ));
        assert!(matches!(
            transfer(1, 2, 0, "USD").validate(),
            Err(ValidationError::TooSmall {
                field: "amount",
                ..
            })
        ));
        assert!(matches!(
            transfer(1, 2, -5, "USD").validate(),
            Err(ValidationError::TooSmall { .. })
        ));
        assert_eq!(
            transfer(1, 2, 10, "XYZ").validate().unwrap_err(),
            ValidationError::UnsupportedCurrency("XYZ".to_string())
        );
    }

    #[test]
    fn test_create_account_request_validation() {
        let req = CreateAccountRequest {
            owner: "  alice ".to_string(),
            currency: "EUR".to_string(),
        };
        assert_eq!(
            req.validate().unwrap(),
            ("alice".to_string(), Currency::EUR)
        );

        let no_owner = CreateAccountRequest {
            owner: String::new(),
            currency: "EUR".to_string(),
        };
        assert_eq!(
            no_owner.validate().unwrap_err(),
            ValidationError::Missing("owner")
        );

        let bad_currency = CreateAccountRequest {
            owner: "bob".to_string(),
            currency: "A".to_string(),
        };
        assert!(matches!(
            bad_currency.validate(),
            Err(ValidationError::UnsupportedCurrency(_))
        ));
    }
}
