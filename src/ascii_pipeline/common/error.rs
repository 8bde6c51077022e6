use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("Backend allocation failed: {0}")]
    AllocationError(String),

    #[error("Backend transfer failed: {0}")]
    TransferError(String),

    #[error("Backend dispatch failed: {0}")]
    DispatchError(String),

    #[error("Invalid image dimensions: width={0}, height={1}")]
    InvalidDimensions(usize, usize),

    #[error("Invalid filter kernel: {0}")]
    InvalidKernel(String),

    #[error("No filter kernels were supplied")]
    EmptyKernelList,

    #[error("Invalid glyph library: {0}")]
    InvalidGlyphs(String),

    #[error("Failed to encode BMP image: {0}")]
    EncodeError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConversionError>;
