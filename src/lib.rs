//! # tagvm
//!
//! A grammar-driving virtual machine. Grammars are tables of productions; productions are
//! step functions that yield matching instructions; the evaluator interprets those
//! instructions against a source and emits a flat stream of tags describing a lossless
//! concrete syntax tree.
//!
//! See the [vm module](crate::vm) for the architecture.

pub mod vm;
