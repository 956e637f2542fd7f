// SPDX-FileCopyrightText: 2025 ruzu contributors
// SPDX-License-Identifier: GPL-3.0-or-later

/// Reusable byte buffers for moving surface data between guest memory and
/// the host.
///
/// Buffer 0 holds the linear host image, buffer 1 the raw guest bytes.
pub struct StagingCache {
    buffers: Vec<Vec<u8>>,
}

impl StagingCache {
    pub const MIN_BUFFERS: usize = 2;

    pub fn new(count: usize) -> Self {
        Self {
            buffers: vec![Vec::new(); count.max(Self::MIN_BUFFERS)],
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    #[cfg(test)]
    pub fn buffer(&self, index: usize) -> &[u8] {
        self.buffers.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Resize the host and guest buffers and borrow both.
    pub fn host_and_guest(&mut self, host_size: usize, guest_size: usize) -> (&mut [u8], &mut [u8]) {
        let (host, rest) = self.buffers.split_at_mut(1);
        let host = &mut host[0];
        let guest = &mut rest[0];
        host.resize(host_size, 0);
        guest.resize(guest_size, 0);
        (host.as_mut_slice(), guest.as_mut_slice())
    }
}

impl Default for StagingCache {
    fn default() -> Self {
        Self::new(Self::MIN_BUFFERS)
    }
}
