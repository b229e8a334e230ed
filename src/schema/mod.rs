//! Content and domain types shared by every engine component.

pub mod character;
pub mod event;
pub mod fragment;
pub mod scene;
pub mod value;
