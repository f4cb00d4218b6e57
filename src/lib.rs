#![no_std]
#![feature(type_alias_impl_trait)]

pub mod app;
pub mod config;
pub mod controllers;
pub mod domain;
pub mod infrastructure;
pub mod net;
