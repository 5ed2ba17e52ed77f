//! The fixed-size header: magic, then the start of every section in 4-byte words.

use crate::{
    cursor::{Reader, Writer},
    Error,
};

/// Bytes every container starts with.
pub const MAGIC: [u8; 8] = [0x4b, 0x44, 0x4d, 0x52, 0x00, 0x01, 0x01, 0x00];

/// Number of sections, and of offsets in the header.
pub const SECTION_COUNT: usize = 8;

/// Size of the header, which is also the start of the first section.
pub const HEADER_SIZE: usize = MAGIC.len() + SECTION_COUNT * 4;

/// Byte offsets at which each section starts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SectionOffsets(pub [usize; SECTION_COUNT]);

impl SectionOffsets {
    pub fn start(&self, section: usize) -> usize {
        self.0[section]
    }

    /// Offset at which `section` must end.
    pub fn end(&self, section: usize) -> usize {
        match self.0.get(section + 1) {
            Some(next) => *next,
            None => self.size(),
        }
    }

    /// Total size of a container with these offsets. The last section holds a single word.
    pub fn size(&self) -> usize {
        self.0[SECTION_COUNT - 1] + 4
    }

    pub fn write(&self, buf: &mut Writer) -> Result<(), Error> {
        buf.write_bytes(&MAGIC);
        for offset in self.0 {
            if offset % 4 != 0 {
                return Err(Error::InvalidHeader("section is not word aligned"));
            }
            let words = u32::try_from(offset / 4).map_err(|_| Error::InvalidLength {
                what: "container",
                found: offset,
                max: u32::MAX as usize * 4,
            })?;
            buf.write_u32(words);
        }
        Ok(())
    }

    pub fn read(buf: &mut Reader<'_>) -> Result<Self, Error> {
        if buf.read_bytes(MAGIC.len()).ok() != Some(&MAGIC[..]) {
            return Err(Error::NotAKdmFile);
        }
        let mut offsets = [0; SECTION_COUNT];
        for offset in &mut offsets {
            *offset = (buf.read_u32()? as usize)
                .checked_mul(4)
                .ok_or(Error::InvalidHeader("section offset overflows"))?;
        }
        if offsets[0] != HEADER_SIZE {
            return Err(Error::InvalidHeader("first section does not follow the header"));
        }
        if offsets.windows(2).any(|pair| pair[0] > pair[1]) {
            return Err(Error::InvalidHeader("sections are out of order"));
        }
        Ok(Self(offsets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY: SectionOffsets = SectionOffsets([0x28, 76, 80, 84, 104, 192, 196, 216]);

    #[test]
    fn test_write_read() {
        assert_eq!(HEADER_SIZE, 0x28);
        let mut buf = Writer::default();
        EMPTY.write(&mut buf).unwrap();
        let bytes = buf.freeze();
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(&bytes[..12], &[0x4b, 0x44, 0x4d, 0x52, 0, 1, 1, 0, 10, 0, 0, 0]);

        let read = SectionOffsets::read(&mut Reader::new(&bytes)).unwrap();
        assert_eq!(read, EMPTY);
        assert_eq!(read.end(0), 76);
        assert_eq!(read.end(7), 220);
        assert_eq!(read.size(), 220);
    }

    #[test]
    fn test_not_a_kdm_file() {
        let mut bytes = vec![0u8; HEADER_SIZE];
        assert!(matches!(
            SectionOffsets::read(&mut Reader::new(&bytes)),
            Err(Error::NotAKdmFile)
        ));
        assert!(matches!(
            SectionOffsets::read(&mut Reader::new(&MAGIC[..4])),
            Err(Error::NotAKdmFile)
        ));

        bytes[..8].copy_from_slice(&MAGIC);
        assert!(matches!(
            SectionOffsets::read(&mut Reader::new(&bytes)),
            Err(Error::InvalidHeader(_))
        ));
        assert!(matches!(
            SectionOffsets::read(&mut Reader::new(&bytes[..12])),
            Err(Error::UnexpectedEndOfFile(_))
        ));
    }

    #[test]
    fn test_out_of_order() {
        let mut offsets = EMPTY;
        offsets.0[3] = 200;
        let mut buf = Writer::default();
        offsets.write(&mut buf).unwrap();
        assert!(matches!(
            SectionOffsets::read(&mut Reader::new(&buf.freeze())),
            Err(Error::InvalidHeader(_))
        ));
    }
}
