// src/utils/mod.rs

pub mod email;
pub mod extract;
pub mod hash;
pub mod html;
pub mod jwt;
pub mod storage;
