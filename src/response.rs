use std::borrow::Cow;

use serde::Serialize;

/// Uniform wrapper for every response body.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub message: Cow<'static, str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PageMeta>,
}

impl<T: Serialize> Envelope<T> {
    pub fn success(message: impl Into<Cow<'static, str>>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            error: None,
            pagination: None,
        }
    }

    pub fn with_pagination(mut self, pagination: PageMeta) -> Self {
        self.pagination = Some(pagination);
        self
    }
}

impl Envelope<()> {
    pub fn message(message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            error: None,
            pagination: None,
        }
    }

    pub fn failure(message: impl Into<Cow<'static, str>>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            error: Some(error.into()),
            pagination: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl PageMeta {
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        let limit_u64 = u64::from(limit.max(1));
        Self {
            page,
            limit,
            total,
            total_pages: total.div_ceil(limit_u64),
        }
    }
}
