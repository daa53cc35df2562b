//! The body file holds one fixed-size record per possible state id.
//!
//! ```text
//! byte 0        flags (bit 0 = exists, bit 1 = marked)
//! bytes 1..=L   label, zero padded (L = label length)
//! remaining     transition slots, each an event id followed by a target state id;
//!               a zero event id marks an unused slot
//! ```
//!
//! Records past the end of the file are treated as all-zero, i.e. non-existent.

use std::{
    fs::{File, OpenOptions},
    io::{ErrorKind, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use tracing::{debug, trace};

use crate::{
    capacity::Layout,
    codec::{bytes_to_uint, uint_to_bytes},
    error::{AutomatonError, Result},
    math::Bijection,
    model::{EventId, State, StateId, Transition},
};

/// Flag bit signalling that a record holds a state.
pub const EXISTS: u8 = 0b01;
/// Flag bit signalling that the state is marked.
pub const MARKED: u8 = 0b10;

/// Encodes a state record. The label and transitions must fit into `layout`.
pub(crate) fn encode_record(
    layout: &Layout,
    label: &str,
    marked: bool,
    transitions: &[Transition],
) -> Vec<u8> {
    debug_assert!(layout.fits_label(label.len()));
    debug_assert!(transitions.len() <= layout.transition_capacity());
    let mut buf = vec![0u8; layout.record_size()];
    buf[0] = EXISTS | if marked { MARKED } else { 0 };
    buf[1..1 + label.len()].copy_from_slice(label.as_bytes());
    let ew = layout.event_id_width();
    let sw = layout.state_id_width();
    let mut offset = layout.transitions_offset();
    for t in transitions {
        uint_to_bytes(t.event as u64, ew, &mut buf, offset);
        uint_to_bytes(t.target, sw, &mut buf, offset + ew);
        offset += ew + sw;
    }
    buf
}

/// Decodes a state record, returns `None` if the record does not hold a state. If
/// `with_transitions` is false, the transition slots are not looked at.
pub(crate) fn decode_record(
    layout: &Layout,
    id: StateId,
    buf: &[u8],
    with_transitions: bool,
) -> Option<State> {
    if buf[0] & EXISTS == 0 {
        return None;
    }
    let marked = buf[0] & MARKED != 0;
    let label_bytes = &buf[1..layout.transitions_offset()];
    let end = label_bytes
        .iter()
        .position(|b| *b == 0)
        .unwrap_or(label_bytes.len());
    let label = String::from_utf8_lossy(&label_bytes[..end]).into_owned();

    let mut transitions = vec![];
    if with_transitions {
        let ew = layout.event_id_width();
        let sw = layout.state_id_width();
        let mut offset = layout.transitions_offset();
        for _ in 0..layout.transition_capacity() {
            let event = bytes_to_uint(buf, offset, ew) as EventId;
            if event != 0 {
                transitions.push(Transition::new(event, bytes_to_uint(buf, offset + ew, sw)));
            }
            offset += ew + sw;
        }
    }
    Some(State::with_transitions(id, label, marked, transitions))
}

/// Reads as many bytes as are available at `offset`, zero filling the rest of `buf`.
fn read_at(mut file: &File, offset: u64, buf: &mut [u8]) -> Result<()> {
    if offset >= file.metadata()?.len() {
        buf.fill(0);
        return Ok(());
    }
    file.seek(SeekFrom::Start(offset))?;
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    buf[filled..].fill(0);
    Ok(())
}

fn write_at(mut file: &File, offset: u64, buf: &[u8]) -> Result<()> {
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(buf)?;
    Ok(())
}

/// An open body file.
#[derive(Debug)]
pub(crate) struct Body {
    path: PathBuf,
    file: File,
}

impl Body {
    /// Creates an empty body file, truncating an existing one.
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Opens an existing body file.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// The id of the last record that is (at least partially) present in the file.
    pub fn highest_record(&self, layout: &Layout) -> Result<StateId> {
        let len = self.file.metadata()?.len();
        let size = layout.record_size() as u64;
        Ok(len.div_ceil(size))
    }

    /// Reads the start of the record of `id` into `buf`. A record that cannot be addressed lies
    /// past the end of every file and reads as zero.
    fn read_into(&self, layout: &Layout, id: StateId, buf: &mut [u8]) -> Result<()> {
        match layout.record_offset(id) {
            Ok(offset) => read_at(&self.file, offset, buf),
            Err(AutomatonError::CapacityExceeded { .. }) => {
                buf.fill(0);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Reads the flag byte of a record.
    pub fn flags(&self, layout: &Layout, id: StateId) -> Result<u8> {
        let mut flag = [0u8; 1];
        self.read_into(layout, id, &mut flag)?;
        Ok(flag[0])
    }

    /// Reads the part of a record up to (excluding) the transition slots.
    pub fn read_prefix(&self, layout: &Layout, id: StateId) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; layout.transitions_offset()];
        self.read_into(layout, id, &mut buf)?;
        Ok(buf)
    }

    /// Reads a complete record.
    pub fn read_record(&self, layout: &Layout, id: StateId) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; layout.record_size()];
        self.read_into(layout, id, &mut buf)?;
        Ok(buf)
    }

    /// Overwrites a complete record.
    pub fn write_record(&mut self, layout: &Layout, id: StateId, record: &[u8]) -> Result<()> {
        debug_assert_eq!(record.len(), layout.record_size());
        write_at(&self.file, layout.record_offset(id)?, record)
    }

    /// Overwrites the flag byte of a record.
    pub fn write_flags(&mut self, layout: &Layout, id: StateId, flags: u8) -> Result<()> {
        write_at(&self.file, layout.record_offset(id)?, &[flags])
    }

    /// Rewrites every record from layout `old` into layout `new`. If `renumbering` is given, every
    /// state id (of records and of transition targets) is translated through it, states and
    /// transitions without an image are dropped.
    ///
    /// The new file is built next to the current one and then moved over it.
    pub fn rebuild(
        &mut self,
        old: &Layout,
        new: &Layout,
        renumbering: Option<&Bijection<StateId, StateId>>,
    ) -> Result<()> {
        let highest = self.highest_record(old)?;
        debug!(
            "rebuilding body {} ({} records of {} bytes into records of {} bytes)",
            self.path.display(),
            highest,
            old.record_size(),
            new.record_size()
        );
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let replacement = tempfile::NamedTempFile::new_in(dir)?;

        let translate = |q: StateId| match renumbering {
            Some(map) => map.get_by_left(&q).copied(),
            None => Some(q),
        };
        let mut written = 0u64;
        for id in 1..=highest {
            let record = self.read_record(old, id)?;
            let Some(state) = decode_record(old, id, &record, true) else {
                continue;
            };
            let Some(new_id) = translate(id) else {
                trace!("dropping state {id} during rebuild");
                continue;
            };
            let (label, marked, transitions) = state.into_parts();
            let transitions: Vec<_> = transitions
                .into_iter()
                .filter_map(|t| Some(Transition::new(t.event, translate(t.target)?)))
                .collect();
            let encoded = encode_record(new, &label, marked, &transitions);
            write_at(replacement.as_file(), new.record_offset(new_id)?, &encoded)?;
            written += 1;
        }
        replacement.as_file().flush()?;

        self.file = replacement.persist(&self.path)?;
        debug!("rebuilt body with {written} states");
        Ok(())
    }

    /// Copies the body file to `target`.
    pub fn copy_to(&mut self, target: &Path) -> Result<()> {
        self.file.flush()?;
        std::fs::copy(&self.path, target)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capacity::Capacities;

    fn layout(transitions: u32, label_length: u32) -> Layout {
        Layout::new(Capacities {
            transitions,
            label_length,
            ..Default::default()
        })
    }

    #[test]
    fn record_layout_is_bit_exact() {
        let layout = layout(3, 4);
        let record = encode_record(
            &layout,
            "ab",
            true,
            &[Transition::new(1, 2), Transition::new(3, 4)],
        );
        assert_eq!(
            record,
            vec![0b11, b'a', b'b', 0, 0, 1, 2, 3, 4, 0, 0]
        );
        let state = decode_record(&layout, 7, &record, true).unwrap();
        assert_eq!(state.id(), 7);
        assert_eq!(state.label(), "ab");
        assert!(state.is_marked());
        assert_eq!(
            state.transitions(),
            &[Transition::new(1, 2), Transition::new(3, 4)]
        );

        let light = decode_record(&layout, 7, &record, false).unwrap();
        assert!(light.transitions().is_empty());
        assert!(decode_record(&layout, 7, &vec![0u8; record.len()], true).is_none());
    }

    #[test]
    fn missing_records_read_as_zero() {
        let dir = tempfile::tempdir().unwrap();
        let mut body = Body::create(&dir.path().join("a.bdy")).unwrap();
        let layout = layout(1, 2);
        assert_eq!(body.highest_record(&layout).unwrap(), 0);
        assert_eq!(body.flags(&layout, 10).unwrap(), 0);

        let record = encode_record(&layout, "x", false, &[]);
        body.write_record(&layout, 3, &record).unwrap();
        assert_eq!(body.highest_record(&layout).unwrap(), 3);
        assert_eq!(body.flags(&layout, 3).unwrap(), EXISTS);
        assert_eq!(body.flags(&layout, 2).unwrap(), 0);
        assert_eq!(body.read_record(&layout, 3).unwrap(), record);
        assert_eq!(body.read_prefix(&layout, 3).unwrap(), vec![EXISTS, b'x', 0]);

        let wide = layout.grown_for_state(u64::MAX);
        assert_eq!(body.flags(&wide, u64::MAX).unwrap(), 0);
        assert!(body.read_record(&wide, u64::MAX).unwrap().iter().all(|b| *b == 0));
        assert!(body.write_record(&wide, u64::MAX, &vec![0; wide.record_size()]).is_err());
    }

    #[test]
    fn rebuild_reencodes_and_renumbers() {
        let dir = tempfile::tempdir().unwrap();
        let mut body = Body::create(&dir.path().join("a.bdy")).unwrap();
        let old = layout(1, 1);
        body.write_record(&old, 2, &encode_record(&old, "a", true, &[Transition::new(1, 5)]))
            .unwrap();
        body.write_record(&old, 5, &encode_record(&old, "b", false, &[Transition::new(1, 2)]))
            .unwrap();

        let new = Layout::new(Capacities {
            states: 70_000,
            transitions: 2,
            label_length: 3,
            ..Default::default()
        });
        let mut map = Bijection::new();
        map.insert(2, 1);
        map.insert(5, 2);
        body.rebuild(&old, &new, Some(&map)).unwrap();

        assert_eq!(body.highest_record(&new).unwrap(), 2);
        let first = decode_record(&new, 1, &body.read_record(&new, 1).unwrap(), true).unwrap();
        assert_eq!(first.label(), "a");
        assert!(first.is_marked());
        assert_eq!(first.transitions(), &[Transition::new(1, 2)]);
        let second = decode_record(&new, 2, &body.read_record(&new, 2).unwrap(), true).unwrap();
        assert_eq!(second.transitions(), &[Transition::new(1, 1)]);
    }
}
