//! Subtitle engine: conversion client, decoding, batch orchestration and file output.
mod client;
mod decode;
mod envelope;
mod export;
mod filename;
mod orchestrator;
mod persist;
mod types;

pub use client::{ClientSettings, SubtitleConverter, ZhConvertClient};
pub use decode::{decode_source, decode_subtitle, DecodeError, DecodedText};
pub use envelope::{decode_envelope, encode_modules, Envelope, Operation, Payload};
pub use export::{export_converted, ExportError, ExportOptions, ExportSummary};
pub use filename::converted_filename;
pub use orchestrator::{BatchOrchestrator, BatchSummary, SharedRegistry};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use types::{
    ConnectionState, ConversionError, ConversionOutput, ConversionRequest, ConversionResult,
    ConvertOptions, FailureKind, ServiceInfo, DEFAULT_API_BASE_URL, DEFAULT_CONVERTER,
    DEFAULT_JP_TEXT_STYLES, DIFF_TEMPLATE,
};
