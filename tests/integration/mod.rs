//! Integration tests for githooker
//!
//! These tests drive the full router with real signed requests and real
//! commands installed in a scratch command root.
