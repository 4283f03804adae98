//! Hand-built ZXAY/EMUL containers for integration tests.

#![allow(dead_code)]

/// One song of a test container.
pub struct TestSong {
    pub name: String,
    pub song_length: u16,
    pub fade_length: u16,
    pub stack: u16,
    pub init: u16,
    pub interrupt: u16,
    pub blocks: Vec<(u16, Vec<u8>)>,
    /// Replaces the generated address table verbatim.
    pub raw_address_table: Option<Vec<u8>>,
}

impl TestSong {
    /// A song whose single block at `address` holds `code`, with INIT at the
    /// start of the block.
    pub fn with_code(name: &str, address: u16, code: &[u8]) -> Self {
        Self {
            name: name.to_string(),
            song_length: 0,
            fade_length: 0,
            stack: 0xF000,
            init: address,
            interrupt: 0,
            blocks: vec![(address, code.to_vec())],
            raw_address_table: None,
        }
    }

    pub fn interrupt(mut self, address: u16) -> Self {
        self.interrupt = address;
        self
    }

    pub fn init(mut self, address: u16) -> Self {
        self.init = address;
        self
    }

    pub fn block(mut self, address: u16, data: &[u8]) -> Self {
        self.blocks.push((address, data.to_vec()));
        self
    }
}

/// Builder for a complete AY file.
pub struct AyBuilder {
    pub author: String,
    pub misc: String,
    pub songs: Vec<TestSong>,
}

impl AyBuilder {
    pub fn new() -> Self {
        Self {
            author: "Test Author".to_string(),
            misc: "Test file".to_string(),
            songs: Vec::new(),
        }
    }

    pub fn song(mut self, song: TestSong) -> Self {
        self.songs.push(song);
        self
    }

    /// Offset of the song structure table in the built file.
    pub const SONG_TABLE: usize = 20;

    pub fn build(&self) -> Vec<u8> {
        assert!(!self.songs.is_empty(), "an AY file holds at least one song");
        let mut out = Vec::new();
        out.extend_from_slice(b"ZXAYEMUL");
        out.push(3); // file version
        out.push(0); // player version
        out.extend_from_slice(&[0, 0]); // special player
        out.extend_from_slice(&[0, 0, 0, 0]); // author, misc
        out.push((self.songs.len() - 1) as u8);
        out.push(0); // first song
        out.extend_from_slice(&[0, 0]); // song table

        let table = out.len();
        patch(&mut out, 18, table, 18);
        out.resize(table + 4 * self.songs.len(), 0);

        let author = push_string(&mut out, &self.author);
        patch(&mut out, 12, author, 12);
        let misc = push_string(&mut out, &self.misc);
        patch(&mut out, 14, misc, 14);

        for (i, song) in self.songs.iter().enumerate() {
            let entry = table + 4 * i;
            let name = push_string(&mut out, &song.name);
            patch(&mut out, entry, name, entry);

            let record = out.len();
            patch(&mut out, entry + 2, record, entry + 2);
            out.extend_from_slice(&[0, 1, 2, 3]);
            out.extend_from_slice(&song.song_length.to_be_bytes());
            out.extend_from_slice(&song.fade_length.to_be_bytes());
            out.extend_from_slice(&[0, 0]); // hi/lo register preset
            out.extend_from_slice(&[0, 0, 0, 0]); // points, addresses

            let points = out.len();
            patch(&mut out, record + 10, points, record + 10);
            for word in [song.stack, song.init, song.interrupt] {
                out.extend_from_slice(&word.to_be_bytes());
            }

            let addresses = out.len();
            patch(&mut out, record + 12, addresses, record + 12);
            if let Some(raw) = &song.raw_address_table {
                out.extend_from_slice(raw);
                continue;
            }
            out.resize(addresses + 6 * song.blocks.len() + 2, 0);
            for (j, (address, data)) in song.blocks.iter().enumerate() {
                let entry = addresses + 6 * j;
                out[entry..entry + 2].copy_from_slice(&address.to_be_bytes());
                out[entry + 2..entry + 4].copy_from_slice(&(data.len() as u16).to_be_bytes());
                let payload = out.len();
                out.extend_from_slice(data);
                patch(&mut out, entry + 4, payload, entry + 4);
            }
        }
        out
    }
}

fn push_string(out: &mut Vec<u8>, text: &str) -> usize {
    let start = out.len();
    out.extend_from_slice(text.as_bytes());
    out.push(0);
    start
}

/// Store `target - anchor` as a big-endian i16 at `field`.
pub fn patch(out: &mut [u8], field: usize, target: usize, anchor: usize) {
    let rel = i16::try_from(target as i64 - anchor as i64).expect("pointer fits in i16");
    out[field..field + 2].copy_from_slice(&rel.to_be_bytes());
}

/// ZX Spectrum: ld a,0xff; out (0xfd),a; ld a,0xbf; out (0xfd),a; jr start
pub const ZX_IMMEDIATE_LOOP: [u8; 10] = [0x3E, 0xFF, 0xD3, 0xFD, 0x3E, 0xBF, 0xD3, 0xFD, 0x18, 0xF6];

/// Amstrad CPC: select register 4 and write 0xF4 through the PPI, forever.
pub const CPC_IMMEDIATE_LOOP: [u8; 26] = [
    0x3E, 0x04, 0xD3, 0x00, // data latch = 4
    0x3E, 0xC2, 0xD3, 0x00, // pending: select
    0x3E, 0x02, 0xD3, 0x00, // commit
    0x3E, 0xF4, 0xD3, 0x00, // data latch = 0xf4
    0x3E, 0x82, 0xD3, 0x00, // pending: write
    0x3E, 0x02, 0xD3, 0x00, // commit
    0x18, 0xE6, // jr start
];

/// Beeper only: ld a,0x10; out (0xfe),a; xor a; out (0xfe),a; jr start
pub const BEEPER_LOOP: [u8; 9] = [0x3E, 0x10, 0xD3, 0xFE, 0xAF, 0xD3, 0xFE, 0x18, 0xF7];

/// Interrupt routine (at 0xC100) counting calls in 0xC200 and writing the
/// count to register 8 while it stays below 21, zero afterwards. The byte at
/// 0xC115 is a bare RET usable as INIT.
pub const COUNTDOWN_ROUTINE: [u8; 22] = [
    0x01, 0xFD, 0xFF, // ld bc,0xfffd
    0x3E, 0x08, // ld a,8
    0xED, 0x79, // out (c),a
    0x06, 0xBF, // ld b,0xbf
    0x21, 0x00, 0xC2, // ld hl,0xc200
    0x34, // inc (hl)
    0x7E, // ld a,(hl)
    0xFE, 0x15, // cp 21
    0x38, 0x01, // jr c,+1
    0xAF, // xor a
    0xED, 0x79, // out (c),a
    0xC9, // ret
];
