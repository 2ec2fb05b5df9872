use byteorder::{ByteOrder, LittleEndian};

pub struct Cursor<'a> {
    inner: &'a [u8],
    pos: usize,
}

pub struct CursorMut<'a> {
    inner: &'a mut [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub const fn new(inner: &'a [u8]) -> Cursor<'a> {
        Cursor { pos: 0, inner }
    }
    pub const fn position(&self) -> usize {
        self.pos
    }
    pub fn remaining(&self) -> usize {
        self.inner.len().saturating_sub(self.pos)
    }

    pub fn read_u8(&mut self) -> u8 {
        let result = self.inner[self.pos];
        self.pos += 1;
        result
    }
    pub fn read_u16(&mut self) -> u16 {
        let result = LittleEndian::read_u16(&self.inner[self.pos..self.pos + 2]);
        self.pos += 2;
        result
    }
    pub fn read_u32(&mut self) -> u32 {
        let result = LittleEndian::read_u32(&self.inner[self.pos..self.pos + 4]);
        self.pos += 4;
        result
    }
    pub fn read_u64(&mut self) -> u64 {
        let result = LittleEndian::read_u64(&self.inner[self.pos..self.pos + 8]);
        self.pos += 8;
        result
    }
}

impl<'a> CursorMut<'a> {
    pub fn new(inner: &'a mut [u8]) -> CursorMut<'a> {
        CursorMut { pos: 0, inner }
    }
    pub const fn position(&self) -> usize {
        self.pos
    }

    pub fn write_u8(&mut self, value: u8) {
        self.inner[self.pos] = value;
        self.pos += 1;
    }
    pub fn write_u16(&mut self, value: u16) {
        LittleEndian::write_u16(&mut self.inner[self.pos..self.pos + 2], value);
        self.pos += 2;
    }
    pub fn write_u32(&mut self, value: u32) {
        LittleEndian::write_u32(&mut self.inner[self.pos..self.pos + 4], value);
        self.pos += 4;
    }
    pub fn write_u64(&mut self, value: u64) {
        LittleEndian::write_u64(&mut self.inner[self.pos..self.pos + 8], value);
        self.pos += 8;
    }
}
