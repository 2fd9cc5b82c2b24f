// Package registry provides lease-based self-registration of a node.

pub mod registrar;

#[cfg(test)]
mod registrar_test;

pub use registrar::{Registrar, Registration, RegistrationError, RegistrationState};
