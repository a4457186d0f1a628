pub(crate) mod limits;
pub(crate) mod meta;
pub(crate) mod request;
