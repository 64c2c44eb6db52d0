//! textbake renders text files through configurable recipes.
//! A recipe picks input files, cuts a window out of their content, parses it
//! into structured data, derives variables and renders a template to an output file.

/// Command-line interface module for the textbake application
pub mod cli;

/// Recipe and preset configuration
/// Supports JSON and YAML formats
pub mod config;

/// Strict text decoding and encoding through encoding_rs
pub mod encoding;

/// Error types and handling for the textbake application
pub mod error;

/// Content window extraction by index, line, literal or regex bounds
pub mod extract;

/// IP address filters for templates
pub mod filters;

/// Parsers turning extracted content into structured values
/// Handles plain, JSON, YAML, XML, DSV and TextFSM content
pub mod formats;

pub mod logger;

/// Per-recipe execution over the matched input files
pub mod processor;

/// Template loading and rendering
pub mod renderer;

/// Recipe and preset selection, and the top-level run loop
pub mod runner;

/// TextFSM template engine
pub mod textfsm;

/// Intrinsic and regex-derived recipe variables
pub mod variables;
