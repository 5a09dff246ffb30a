pub(crate) mod visited_path;

pub use visited_path::VisitedPath;
