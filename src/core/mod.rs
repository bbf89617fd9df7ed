//! Core XML parsing primitives
//!
//! This module contains the fundamental building blocks for XML parsing:
//! - Entities: XML entity decoding with Cow (zero-copy when possible) and
//!   escaping for serialization
//! - Attributes: Attribute parsing and extraction

pub mod attributes;
pub mod entities;
