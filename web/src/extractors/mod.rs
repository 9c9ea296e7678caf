pub(crate) mod graph_session;

pub(crate) use graph_session::GraphSession;
