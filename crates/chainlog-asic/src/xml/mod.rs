//! XML support: canonicalization for digesting and a small read-only tree
//! for the documents this crate consumes.

pub mod c14n;
pub mod tree;

pub use c14n::{
    canonicalize, canonicalize_subtree, is_supported_method, Apex, C14N_11_OMIT_COMMENTS_URI,
    C14N_OMIT_COMMENTS_URI,
};
pub use tree::XmlElement;
