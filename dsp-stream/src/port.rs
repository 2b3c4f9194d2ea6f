//! Control-port access to the remote DSP.
//!
//! Everything the host knows about the DSP's state comes through
//! [`ControlPort`]: single 32-bit register reads and writes plus a block read
//! used to pull audio words straight into a ring buffer. Addresses are
//! absolute byte addresses in the DSP's register space; the callers compute
//! them from symbol offsets and never hard-code them.
//!
//! With the `i2c` feature (on by default) [`I2cControlPort`] implements the
//! trait over any [`embedded_hal::i2c::I2c`] bus.

/// Register-level access to the remote DSP.
pub trait ControlPort {
    /// Bus-level error type.
    type Error: core::fmt::Debug;

    /// Read one 32-bit register.
    fn read(&mut self, addr: u32) -> Result<u32, Self::Error>;

    /// Write one 32-bit register.
    fn write(&mut self, addr: u32, value: u32) -> Result<(), Self::Error>;

    /// Read `buf.len()` bytes starting at `addr`.
    fn read_block(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), Self::Error>;
}

impl<P: ControlPort + ?Sized> ControlPort for &mut P {
    type Error = P::Error;

    fn read(&mut self, addr: u32) -> Result<u32, Self::Error> {
        (**self).read(addr)
    }

    fn write(&mut self, addr: u32, value: u32) -> Result<(), Self::Error> {
        (**self).write(addr, value)
    }

    fn read_block(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), Self::Error> {
        (**self).read_block(addr, buf)
    }
}

#[cfg(feature = "i2c")]
pub use self::i2c::I2cControlPort;

#[cfg(feature = "i2c")]
mod i2c {
    use embedded_hal::i2c::I2c;

    use super::ControlPort;

    /// [`ControlPort`] over an I2C bus.
    ///
    /// Register addresses and values are 32 bits wide and sent big-endian.
    /// A block read writes the start address and then clocks in the
    /// requested number of bytes in a single transaction.
    pub struct I2cControlPort<I2C> {
        i2c: I2C,
        address: u8,
    }

    impl<I2C: I2c> I2cControlPort<I2C> {
        /// Default 7-bit device address.
        pub const DEFAULT_ADDRESS: u8 = 0x40;

        /// Create a port using [`DEFAULT_ADDRESS`](Self::DEFAULT_ADDRESS).
        pub fn new(i2c: I2C) -> Self {
            Self::new_with_address(i2c, Self::DEFAULT_ADDRESS)
        }

        /// Create a port for a device at `address`.
        pub fn new_with_address(i2c: I2C, address: u8) -> Self {
            Self { i2c, address }
        }

        /// Release the underlying bus.
        pub fn release(self) -> I2C {
            self.i2c
        }
    }

    impl<I2C: I2c> ControlPort for I2cControlPort<I2C> {
        type Error = I2C::Error;

        fn read(&mut self, addr: u32) -> Result<u32, Self::Error> {
            let mut val_buf = [0u8; 4];
            self.i2c
                .write_read(self.address, &addr.to_be_bytes(), &mut val_buf)?;
            Ok(u32::from_be_bytes(val_buf))
        }

        fn write(&mut self, addr: u32, value: u32) -> Result<(), Self::Error> {
            let a = addr.to_be_bytes();
            let v = value.to_be_bytes();
            let buf = [a[0], a[1], a[2], a[3], v[0], v[1], v[2], v[3]];
            self.i2c.write(self.address, &buf)
        }

        fn read_block(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), Self::Error> {
            if buf.is_empty() {
                return Ok(());
            }
            self.i2c.write_read(self.address, &addr.to_be_bytes(), buf)
        }
    }

}
