//! Vectors indexed by recorded values.
//!
//! A load or store whose index is a variable cannot be resolved at record
//! time. [`VecAd`] records such accesses as `Ld*` / `St*` instructions so a
//! replay at another point reads and writes the element the new index
//! selects.

use crate::ad::Ad;
use crate::base::Base;
use crate::error::{Result, TapeError};
use crate::opcode::Addr;
use crate::tape::{with_recorder, Recorder, TapeId, TapeLocal};

/// Indexed vector of recorded values.
///
/// Until the first access involving a recorded value the vector is local
/// and holds constants only. From then on it lives on that tape and every
/// access is recorded.
#[derive(Clone, Debug)]
pub struct VecAd<B: TapeLocal> {
    values: Vec<Ad<B>>,
    /// Tape and element offset once the vector is on a tape.
    on_tape: Option<(TapeId, Addr)>,
}

impl<B: TapeLocal> VecAd<B> {
    pub fn new(initial: &[B]) -> Self {
        VecAd {
            values: initial.iter().map(|&v| Ad::constant(v)).collect(),
            on_tape: None,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn position(&self, index: &Ad<B>) -> Result<usize> {
        let Some(i) = index.value().to_index() else {
            return Err(TapeError::InvalidIndex {
                len: self.values.len(),
            });
        };
        if i >= self.values.len() {
            return Err(TapeError::IndexOutOfRange {
                index: i,
                len: self.values.len(),
            });
        }
        Ok(i)
    }

    /// Element offset on the recording tape, registering the vector there
    /// on first use.
    fn offset(&mut self, rec: &mut Recorder<B>) -> Result<Addr> {
        match self.on_tape {
            Some((tape, offset)) if tape == rec.id() => Ok(offset),
            Some((tape, _)) => Err(TapeError::ForeignOperand {
                operand: tape,
                current: rec.id(),
            }),
            None => {
                let initial: Vec<Addr> = self
                    .values
                    .iter()
                    .map(|v| rec.put_con_par(v.value()))
                    .collect();
                let offset = rec.put_vecad(&initial);
                self.on_tape = Some((rec.id(), offset));
                Ok(offset)
            }
        }
    }

    /// Element selected by `index`.
    pub fn load(&mut self, index: Ad<B>) -> Result<Ad<B>> {
        let i = self.position(&index)?;
        let element = self.values[i];
        if self.on_tape.is_none() && index.is_constant() {
            return Ok(element);
        }
        with_recorder::<B, _>(|rec| {
            let current = rec.as_ref().map(|r| r.id());
            let idx = index.operand(current)?;
            let Some(rec) = rec else {
                return Err(match self.on_tape {
                    Some((tape, _)) => TapeError::StaleOperand { operand: tape },
                    None => TapeError::NotRecording,
                });
            };
            let offset = self.offset(rec)?;
            let out = rec.put_load(offset, idx, element.value());
            Ok(Ad::from_operand(out, rec.id()))
        })
    }

    /// Replace the element selected by `index`.
    pub fn store(&mut self, index: Ad<B>, value: Ad<B>) -> Result<()> {
        let i = self.position(&index)?;
        if self.on_tape.is_none() && index.is_constant() && value.is_constant() {
            self.values[i] = value;
            return Ok(());
        }
        Ad::common_tape([&index, &value])?;
        with_recorder::<B, _>(|rec| {
            let current = rec.as_ref().map(|r| r.id());
            let (idx, val) = (index.operand(current)?, value.operand(current)?);
            let Some(rec) = rec else {
                return Err(match self.on_tape {
                    Some((tape, _)) => TapeError::StaleOperand { operand: tape },
                    None => TapeError::NotRecording,
                });
            };
            let offset = self.offset(rec)?;
            rec.put_store(offset, idx, val);
            Ok(())
        })?;
        self.values[i] = value;
        Ok(())
    }
}
