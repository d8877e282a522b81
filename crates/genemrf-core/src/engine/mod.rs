//! Inference engine over prior gene networks.
//!
//! This module provides:
//! - **network** / **observations**: the prior graph and clamped gene states
//! - **messages** / **potential**: message storage and the pairwise factor
//! - **belief_propagation**: synchronous loopy sum-product
//! - **posterior**: per-edge agreement probabilities
//! - **mu_search**: grid search over the compatibility weight
//! - **subnetwork** / **encoding**: post-processing of posterior tables

pub mod belief_propagation;
pub mod control;
pub mod encoding;
pub mod errors;
pub mod messages;
pub mod mu_search;
pub mod network;
pub mod observations;
pub mod posterior;
pub mod potential;
pub mod subnetwork;
