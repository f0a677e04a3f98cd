//! DMA loader collaborator.

use acr_contract::EngineDescriptor;

use crate::errors::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Code,
    Data,
}

/// Copies one ucode segment from the WPR into a target falcon's IMEM or DMEM
/// through the target's FBIF. Blocks until the transfer completes or its own
/// timeout expires.
pub trait UcodeLoader {
    fn dma_load(
        &mut self,
        target: &EngineDescriptor,
        segment: Segment,
        fb_offset: u64,
        dst: u32,
        len: u32,
    ) -> Result<()>;
}
