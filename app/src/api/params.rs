//! Query and path parameter validation shared by the read handlers.
//!
//! Every rejection is a 400 with a reason naming the offending parameter;
//! the handlers never see unvalidated input.

use std::collections::HashMap;

use basilica_types::{Address, Hash, Height};

use super::ApiError;

pub const DEFAULT_PAGE_SIZE: u64 = 10;
pub const MAX_PAGE_SIZE: u64 = 100;

#[derive(Clone, Copy, Debug)]
pub struct Pagination {
    pub page: u64,
    pub page_size: u64,
}

/// `page` (1-indexed, default 1) and `pageSize` (default 10, max 100).
pub fn pagination(query: &HashMap<String, String>) -> Result<Pagination, ApiError> {
    let page = match query.get("page") {
        None => 1,
        Some(raw) => positive_integer(raw, "page")?,
    };
    let page_size = match query.get("pageSize") {
        None => DEFAULT_PAGE_SIZE,
        Some(raw) => {
            let size = positive_integer(raw, "pageSize")?;
            if size > MAX_PAGE_SIZE {
                return Err(ApiError::invalid(format!(
                    "pageSize must be at most {MAX_PAGE_SIZE}"
                )));
            }
            size
        }
    };
    Ok(Pagination { page, page_size })
}

fn positive_integer(raw: &str, name: &str) -> Result<u64, ApiError> {
    let value: u64 = raw
        .parse()
        .map_err(|_| ApiError::invalid(format!("{name} must be a positive integer")))?;
    if value == 0 {
        return Err(ApiError::invalid(format!("{name} must be a positive integer")));
    }
    Ok(value)
}

/// Heights are non-negative integers; anything else is a 400.
pub fn height(raw: &str) -> Result<Height, ApiError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ApiError::invalid(format!("invalid height: {raw:?}")));
    }
    raw.parse::<u64>()
        .map(Height::new)
        .map_err(|_| ApiError::invalid(format!("invalid height: {raw:?}")))
}

/// Optional `height` query parameter; absent means "latest".
pub fn opt_height(query: &HashMap<String, String>) -> Result<Option<Height>, ApiError> {
    query.get("height").map(|raw| height(raw)).transpose()
}

pub fn hash(raw: &str) -> Result<Hash, ApiError> {
    Hash::from_hex(raw).map_err(|e| ApiError::invalid(format!("invalid hash: {e}")))
}

pub fn address(raw: &str) -> Result<Address, ApiError> {
    Address::from_hex(raw).map_err(|e| ApiError::invalid(format!("invalid address: {e}")))
}

/// Unix seconds path parameter.
pub fn timestamp(raw: &str) -> Result<u64, ApiError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ApiError::invalid(format!("invalid timestamp: {raw:?}")));
    }
    raw.parse()
        .map_err(|_| ApiError::invalid(format!("invalid timestamp: {raw:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn test_pagination_defaults() {
        let p = pagination(&query(&[])).unwrap();
        assert_eq!((p.page, p.page_size), (1, DEFAULT_PAGE_SIZE));
    }

    #[test]
    fn test_pagination_rejects_non_positive() {
        assert!(pagination(&query(&[("page", "0")])).is_err());
        assert!(pagination(&query(&[("page", "-1")])).is_err());
        assert!(pagination(&query(&[("pageSize", "abc")])).is_err());
        assert!(pagination(&query(&[("pageSize", "101")])).is_err());
    }

    #[test]
    fn test_height_rejects_junk() {
        assert!(height("12").is_ok());
        assert!(height("-3").is_err());
        assert!(height("1.5").is_err());
        assert!(height("latest").is_err());
        assert!(height("").is_err());
    }

    #[test]
    fn test_opt_height_absent_is_latest() {
        assert_eq!(opt_height(&query(&[])).unwrap(), None);
        assert_eq!(
            opt_height(&query(&[("height", "4")])).unwrap(),
            Some(Height::new(4))
        );
        assert!(opt_height(&query(&[("height", "x")])).is_err());
    }
}
