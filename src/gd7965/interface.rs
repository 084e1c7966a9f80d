//! Display interface using SPI
use display_interface::DisplayError;
use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
    spi::SpiDevice,
};

const RESET_DELAY_MS: u32 = 10;
const BUSY_POLL_MS: u32 = 1;

/// SPI plus the three control lines of the panel
pub struct DisplayInterface<SPI, BSY, DC, RST> {
    /// SPI device
    spi: SPI,
    /// Low while the controller is busy
    busy: BSY,
    /// Data/Command Control Pin (High for data, Low for command)
    dc: DC,
    /// Pin for Reseting
    rst: RST,
}

impl<SPI, BSY, DC, RST> DisplayInterface<SPI, BSY, DC, RST> {
    pub fn new(spi: SPI, busy: BSY, dc: DC, rst: RST) -> Self {
        DisplayInterface { spi, busy, dc, rst }
    }

    /// Give back the bus and pins
    pub fn release(self) -> (SPI, BSY, DC, RST) {
        (self.spi, self.busy, self.dc, self.rst)
    }
}

impl<SPI, BSY, DC, RST> DisplayInterface<SPI, BSY, DC, RST>
where
    SPI: SpiDevice,
    RST: OutputPin,
    DC: OutputPin,
    BSY: InputPin,
{
    /// Basic function for sending commands
    pub(crate) fn cmd(&mut self, command: u8) -> Result<(), DisplayError> {
        // low for commands
        self.dc.set_low().map_err(|_| DisplayError::DCError)?;

        self.spi.write(&[command]).map_err(|e| {
            log::error!("SPI write error for command 0x{:02X}: {:?}", command, e);
            DisplayError::BusWriteError
        })
    }

    /// Basic function for sending an array of u8-values of data over spi
    pub(crate) fn data(&mut self, data: &[u8]) -> Result<(), DisplayError> {
        // high for data
        self.dc.set_high().map_err(|_| DisplayError::DCError)?;
        self.spi
            .write(data)
            .map_err(|_| DisplayError::BusWriteError)
    }

    /// Basic function for sending a command and the data belonging to it.
    pub(crate) fn cmd_with_data(&mut self, command: u8, data: &[u8]) -> Result<(), DisplayError> {
        self.cmd(command)?;
        self.data(data)
    }

    /// Send the same byte `repetitions` times, used to fill a whole plane
    pub(crate) fn data_x_times(&mut self, val: u8, repetitions: usize) -> Result<(), DisplayError> {
        self.dc.set_high().map_err(|_| DisplayError::DCError)?;

        // Send in chunks to keep SPI transactions short
        const CHUNK_SIZE: usize = 64;
        let buffer = [val; CHUNK_SIZE];

        let mut left = repetitions;
        while left > 0 {
            let n = left.min(CHUNK_SIZE);
            self.spi
                .write(&buffer[..n])
                .map_err(|_| DisplayError::BusWriteError)?;
            left -= n;
        }
        log::debug!("Completed sending {} bytes of 0x{:02X}", repetitions, val);
        Ok(())
    }

    /// Wait for the busy pin to go HIGH, giving up after `timeout_ms`.
    ///
    /// A timeout is logged and otherwise ignored: the panel either caught up or the
    /// next command fails visibly.
    pub(crate) fn wait_until_idle(&mut self, delay: &mut impl DelayNs, timeout_ms: u32) {
        let mut waited = 0u32;
        loop {
            match self.busy.is_high() {
                Ok(true) => {
                    log::debug!("BUSY released after {} ms", waited);
                    return;
                }
                Ok(false) => {}
                Err(_) => {
                    log::error!("Error reading BUSY pin state - assuming not busy to continue");
                    return;
                }
            }
            if waited >= timeout_ms {
                log::error!("TIMEOUT waiting for BUSY pin to go HIGH after {} ms", waited);
                return;
            }
            delay.delay_ms(BUSY_POLL_MS);
            waited += BUSY_POLL_MS;
        }
    }

    /// Hardware reset pulse
    pub(crate) fn reset(&mut self, delay: &mut impl DelayNs) -> Result<(), DisplayError> {
        self.rst.set_high().map_err(|_| DisplayError::RSError)?;
        delay.delay_ms(RESET_DELAY_MS);
        self.rst.set_low().map_err(|_| DisplayError::RSError)?;
        delay.delay_ms(RESET_DELAY_MS);
        self.rst.set_high().map_err(|_| DisplayError::RSError)?;
        delay.delay_ms(RESET_DELAY_MS);
        Ok(())
    }
}
