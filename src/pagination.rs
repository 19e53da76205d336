use serde::Deserialize;
use utoipa::IntoParams;

const DEFAULT_LIMIT: u64 = 50;
const MAX_LIMIT: u64 = 500;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct Pagination {
    #[param(default = 1, minimum = 1)]
    pub page: Option<u64>,
    #[param(default = 50, minimum = 1, maximum = 500)]
    pub limit: Option<u64>,
}

impl Pagination {
    pub fn limit(&self) -> u64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    pub fn offset(&self) -> u64 {
        self.page.unwrap_or(1).max(1).saturating_sub(1) * self.limit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_clamping() {
        let p = Pagination::default();
        assert_eq!((p.limit(), p.offset()), (50, 0));

        let p = Pagination { page: Some(3), limit: Some(10) };
        assert_eq!((p.limit(), p.offset()), (10, 20));

        let p = Pagination { page: Some(0), limit: Some(10_000) };
        assert_eq!((p.limit(), p.offset()), (500, 0));
    }
}
