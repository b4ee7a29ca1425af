mod router;
pub use router::{query_handler, root_handler};
