//! In-memory register file backing the TCP simulator: four 1000-slot areas plus a read-only
//! mask and a generator type per holding-register address, mirroring `sim_ctx_t`
//! (`simulator/modbus_tcp_simulator.c`).

use std::sync::Mutex;

use crate::simulator::waveform::GeneratorType;

pub const CAPACITY: usize = 1000;

/// One tag's generator bookkeeping: which waveform (if any) drives it, and its display name/
/// address string for `export_drivers_json`/`list_tags_json`.
#[derive(Debug, Clone, Default)]
pub struct TagMeta {
    pub generator: GeneratorType,
    pub name: Option<String>,
    pub address: Option<String>,
}

/// The simulator's register file. Guarded internally by a [`Mutex`] so [`crate::simulator::mod`]'s
/// per-connection handlers and the generator tick can share one instance via `Arc`.
pub struct RegisterStore {
    inner: Mutex<Inner>,
}

struct Inner {
    coil_bits: Vec<bool>,
    input_bits: Vec<bool>,
    hold_regs: Vec<u16>,
    input_regs: Vec<u16>,
    readonly_mask: Vec<bool>,
    tags: Vec<TagMeta>,
}

impl RegisterStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                coil_bits: vec![false; CAPACITY],
                input_bits: vec![false; CAPACITY],
                hold_regs: vec![0; CAPACITY],
                input_regs: vec![0; CAPACITY],
                readonly_mask: vec![false; CAPACITY],
                tags: vec![TagMeta::default(); CAPACITY],
            }),
        }
    }

    /// Reset every area, mask and generator assignment to its zero value.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.coil_bits.iter_mut().for_each(|b| *b = false);
        inner.input_bits.iter_mut().for_each(|b| *b = false);
        inner.hold_regs.iter_mut().for_each(|v| *v = 0);
        inner.input_regs.iter_mut().for_each(|v| *v = 0);
        inner.readonly_mask.iter_mut().for_each(|b| *b = false);
        inner.tags.iter_mut().for_each(|t| *t = TagMeta::default());
    }

    /// Mark `addr` as driven by `generator`. Sine occupies two consecutive registers (hi/lo
    /// halves of the float), every other generator occupies one.
    pub fn mark_tag(&self, addr: u16, generator: GeneratorType, name: String, address: String) {
        let mut inner = self.inner.lock().unwrap();
        let addr = addr as usize;
        let span = if generator == GeneratorType::Sine { 2 } else { 1 };
        if addr + span > CAPACITY {
            return;
        }
        for i in 0..span {
            inner.readonly_mask[addr + i] = true;
        }
        inner.tags[addr] = TagMeta {
            generator,
            name: Some(name),
            address: Some(address),
        };
    }

    pub fn read_holding(&self, start: u16, count: u16) -> Option<Vec<u16>> {
        let inner = self.inner.lock().unwrap();
        let (start, count) = (start as usize, count as usize);
        if start + count > CAPACITY || count == 0 {
            return None;
        }
        Some(inner.hold_regs[start..start + count].to_vec())
    }

    pub fn read_input_registers(&self, start: u16, count: u16) -> Option<Vec<u16>> {
        let inner = self.inner.lock().unwrap();
        let (start, count) = (start as usize, count as usize);
        if start + count > CAPACITY || count == 0 {
            return None;
        }
        Some(inner.input_regs[start..start + count].to_vec())
    }

    pub fn read_coils(&self, start: u16, count: u16) -> Option<Vec<bool>> {
        let inner = self.inner.lock().unwrap();
        let (start, count) = (start as usize, count as usize);
        if start + count > CAPACITY || count == 0 {
            return None;
        }
        Some(inner.coil_bits[start..start + count].to_vec())
    }

    pub fn read_discrete_inputs(&self, start: u16, count: u16) -> Option<Vec<bool>> {
        let inner = self.inner.lock().unwrap();
        let (start, count) = (start as usize, count as usize);
        if start + count > CAPACITY || count == 0 {
            return None;
        }
        Some(inner.input_bits[start..start + count].to_vec())
    }

    /// Write a single holding register. Returns `Err(())` if `start` is out of range or marked
    /// read-only (a generator-driven tag).
    pub fn write_holding(&self, start: u16, value: u16) -> Result<(), ()> {
        let mut inner = self.inner.lock().unwrap();
        let start = start as usize;
        if start >= CAPACITY || inner.readonly_mask[start] {
            return Err(());
        }
        inner.hold_regs[start] = value;
        Ok(())
    }

    pub fn write_coil(&self, start: u16, value: bool) -> Result<(), ()> {
        let mut inner = self.inner.lock().unwrap();
        let start = start as usize;
        if start >= CAPACITY {
            return Err(());
        }
        inner.coil_bits[start] = value;
        Ok(())
    }

    /// Apply one generator tick, mutating every generator-driven register/register-pair.
    pub fn tick_generators(&self, now_ms: i64) {
        let mut inner = self.inner.lock().unwrap();
        for addr in 0..CAPACITY {
            let generator = inner.tags[addr].generator;
            if generator == GeneratorType::None {
                continue;
            }
            crate::simulator::waveform::apply(&mut inner.hold_regs, addr as u16, generator, now_ms);
        }
    }

    pub fn tag_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap()
            .tags
            .iter()
            .filter(|t| t.generator != GeneratorType::None)
            .count()
    }

    /// Snapshot of `(address, meta)` for every configured tag, for the admin JSON exports.
    pub fn tags_snapshot(&self) -> Vec<(u16, TagMeta)> {
        let inner = self.inner.lock().unwrap();
        inner
            .tags
            .iter()
            .enumerate()
            .filter(|(_, t)| t.generator != GeneratorType::None)
            .map(|(addr, t)| (addr as u16, t.clone()))
            .collect()
    }
}

impl Default for RegisterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let store = RegisterStore::new();
        store.write_holding(5, 42).unwrap();
        assert_eq!(store.read_holding(5, 1), Some(vec![42]));
    }

    #[test]
    fn readonly_mask_rejects_write() {
        let store = RegisterStore::new();
        store.mark_tag(5, GeneratorType::Saw, "saw1".into(), "1!400006".into());
        assert!(store.write_holding(5, 1).is_err());
    }

    #[test]
    fn out_of_range_read_returns_none() {
        let store = RegisterStore::new();
        assert_eq!(store.read_holding(999, 5), None);
    }

    #[test]
    fn sine_reserves_two_registers() {
        let store = RegisterStore::new();
        store.mark_tag(10, GeneratorType::Sine, "s".into(), "1!400011".into());
        assert!(store.write_holding(10, 1).is_err());
        assert!(store.write_holding(11, 1).is_err());
    }
}
