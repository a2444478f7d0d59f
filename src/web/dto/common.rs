use serde::Deserialize;

pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;

/// `limit`/`offset` query of every list endpoint.
#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams, utoipa::ToSchema)]
#[into_params(parameter_in = Query)]
pub struct PaginationQuery {
    limit: Option<i64>,
    offset: Option<i64>,
}

impl PaginationQuery {
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        Self { limit, offset }
    }

    /// Clamped to `1..=100`, 20 when absent.
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_and_clamping() {
        let empty = PaginationQuery::default();
        assert_eq!(empty.limit(), 20);
        assert_eq!(empty.offset(), 0);

        let big = PaginationQuery::new(Some(1000), Some(-4));
        assert_eq!(big.limit(), 100);
        assert_eq!(big.offset(), 0);

        assert_eq!(PaginationQuery::new(Some(0), None).limit(), 1);
    }
}
