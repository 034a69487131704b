use std::borrow::Cow;

/// Upstream source identifier (e.g., "ALPHA", "FINDATA").
pub type SourceId = Cow<'static, str>;

/// Currency code (ISO 4217).
pub type Currency = Cow<'static, str>;
