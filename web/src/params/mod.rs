pub(crate) mod graph;
pub(crate) mod user_session;
