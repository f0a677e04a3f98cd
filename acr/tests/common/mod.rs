// acr/tests/common/mod.rs
// Shared fixture: a simulated chip with a two-target WPR.

#![allow(dead_code)]

use acr::crypto::KeySlot;
use acr::handoff::HandoffChannel;
use acr::scrub::Scratch;
use acr::sim::{build_image, SimDma, SimFalcon, WPR_START_UNITS};
use acr::{Acr, AcrConfig, BootPhase, BootTable, BootTarget, EngineId, SoftCrypto, Terminal};
use acr_contract::{HandoffRecord, UcodeManifest, MANIFEST_LEN};
use ed25519_dalek::SigningKey;

pub const IMAGE_LEN: usize = MANIFEST_LEN + 512 + 256;
pub const CODE_SIZE: u32 = 512;
pub const DATA_SIZE: u32 = 256;
pub const BUILD_VERSION: u32 = 5;
pub const HANDOFF_SECRET: [u8; 32] = [0x22; 32];

/// PMU loads over DMA, FECS over the priv bus.
pub const TARGETS: [EngineId; 2] = [EngineId::Pmu, EngineId::Fecs];

pub fn wpr_base() -> u64 {
    (WPR_START_UNITS as u64) << 12
}

pub fn fb_offset(index: usize) -> u64 {
    wpr_base() + 0x1000 * index as u64
}

pub fn signing_key() -> SigningKey {
    SigningKey::from_bytes(&[0x11; 32])
}

pub fn config() -> AcrConfig {
    AcrConfig {
        build_version: BUILD_VERSION,
        poll_budget: 64,
        ..AcrConfig::default()
    }
}

pub struct Fixture {
    pub sim: SimFalcon,
    pub crypto: SoftCrypto,
    pub dma: SimDma,
    pub config: AcrConfig,
    pub images: [[u8; IMAGE_LEN]; 2],
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(config())
    }

    pub fn with_config(config: AcrConfig) -> Self {
        let key = signing_key();
        let mut images = [[0u8; IMAGE_LEN]; 2];
        for (image, id) in images.iter_mut().zip(TARGETS) {
            let manifest =
                UcodeManifest::new(id, 0, CODE_SIZE, DATA_SIZE, 0x20, config.build_version);
            build_image(image, manifest, &key).unwrap();
        }
        Self {
            sim: SimFalcon::new(&config),
            crypto: SoftCrypto::new(HANDOFF_SECRET, 0x1234)
                .with_key(KeySlot::Production(0), key.verifying_key()),
            dma: SimDma::new(),
            config,
            images,
        }
    }

    pub fn run(&mut self, phase: BootPhase) -> Terminal {
        let targets = [
            BootTarget::parse(TARGETS[0], &self.images[0], fb_offset(0)).unwrap(),
            BootTarget::parse(TARGETS[1], &self.images[1], fb_offset(1)).unwrap(),
        ];
        Acr::new(
            phase,
            &mut self.sim,
            &mut self.crypto,
            &mut self.dma,
            &self.config,
            BootTable::new(&targets),
        )
        .execute()
    }

    /// Re-sign image `index` as ucode version `version`.
    pub fn resign_image(&mut self, index: usize, version: u32) {
        let manifest = UcodeManifest::new(TARGETS[index], 0, CODE_SIZE, DATA_SIZE, 0x20, version);
        build_image(&mut self.images[index], manifest, &signing_key()).unwrap();
    }

    /// Flip one payload byte so the image no longer matches its signature.
    pub fn corrupt_payload(&mut self, index: usize) {
        self.images[index][MANIFEST_LEN + 7] ^= 0xff;
    }

    /// Leave behind what a successful Bootstrap run would have written.
    pub fn seed_bootstrap_handoff(&mut self) {
        HandoffChannel::new()
            .write(
                &mut self.sim,
                &mut self.crypto,
                &mut Scratch::new(),
                HandoffRecord::completed(BootPhase::Bootstrap, self.config.build_version),
            )
            .unwrap();
    }
}
