// Controller discovery
//
// One pass over the USB bus: every device with the ODrive vendor/product
// IDs is resolved into a driver handle through its "usb:<bus>:<address>"
// connection string. The result is a snapshot owned by the caller.

use tracing::{debug, info};

use crate::config::{USB_PRODUCT_ID, USB_VENDOR_ID};
use crate::error::{DiscoveryError, DriverError};

/// Position of a device on the USB bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UsbLocation {
    pub bus: u8,
    pub address: u8,
}

impl UsbLocation {
    pub fn connection_string(&self) -> String {
        format!("usb:{}:{}", self.bus, self.address)
    }
}

/// USB device query service
pub trait UsbQuery {
    /// All attached devices matching the IDs. An empty list is not an error.
    fn find_all(&self, vendor_id: u16, product_id: u16) -> Result<Vec<UsbLocation>, DiscoveryError>;
}

/// Driver connection service: opens a device from a connection string.
pub trait Connector {
    type Device;

    fn connect(&self, connection: &str) -> Result<Self::Device, DriverError>;
}

/// Enumerate attached controllers and connect to each one.
///
/// No matching devices yields an empty list. Any enumeration or connection
/// fault aborts the pass and is returned.
pub fn find_controllers<Q, K>(usb: &Q, connector: &K) -> Result<Vec<K::Device>, DiscoveryError>
where
    Q: UsbQuery + ?Sized,
    K: Connector + ?Sized,
{
    let locations = usb.find_all(USB_VENDOR_ID, USB_PRODUCT_ID)?;
    debug!("Found {} matching USB devices", locations.len());

    let mut devices = Vec::with_capacity(locations.len());
    for location in locations {
        let connection = location.connection_string();
        let device = connector
            .connect(&connection)
            .map_err(|source| DiscoveryError::Connect {
                connection: connection.clone(),
                source,
            })?;
        info!("Added controller at {}", connection);
        devices.push(device);
    }
    Ok(devices)
}

/// [`UsbQuery`] backed by libusb
#[cfg(feature = "usb")]
#[derive(Debug, Clone, Copy, Default)]
pub struct RusbQuery;

#[cfg(feature = "usb")]
impl UsbQuery for RusbQuery {
    fn find_all(&self, vendor_id: u16, product_id: u16) -> Result<Vec<UsbLocation>, DiscoveryError> {
        let mut found = Vec::new();
        for device in rusb::devices()?.iter() {
            let descriptor = device.device_descriptor()?;
            if descriptor.vendor_id() == vendor_id && descriptor.product_id() == product_id {
                found.push(UsbLocation {
                    bus: device.bus_number(),
                    address: device.address(),
                });
            }
        }
        Ok(found)
    }
}

/// [`find_controllers`] on the system USB bus
#[cfg(feature = "usb")]
pub fn find_odrives<K>(connector: &K) -> Result<Vec<K::Device>, DiscoveryError>
where
    K: Connector + ?Sized,
{
    find_controllers(&RusbQuery, connector)
}
