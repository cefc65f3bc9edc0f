//! Bidirectional URL routing: compiled route patterns, ordered route table,
//! request resolution and URL generation.

mod pattern;
mod router;
mod url;

pub use pattern::Route;
pub use router::{RequestResolver, ResolvedRequest, RouteTable};
pub use url::UrlGenerator;
