//! Per-device aggregation of advertising reports.

use crate::advertisement::{AdFields, AddressType, AdvType};
use crate::lookup;
use crate::mac_address::MacAddress;
use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use std::time::SystemTime;

/// Everything known about one advertiser address.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRecord {
    pub address: MacAddress,
    pub address_type: AddressType,
    /// Last non-empty advertised name
    pub name: Option<String>,
    /// Vendor registered for the address prefix
    pub manufacturer: Option<&'static str>,
    pub rssi_min: i8,
    pub rssi_max: i8,
    pub rssi_avg: f64,
    pub tx_power: Option<i8>,
    pub appearance: Option<u16>,
    /// 16-bit service UUIDs in order of first appearance
    pub services: Vec<u16>,
    pub company_id: Option<u16>,
    pub flags: Option<u8>,
    pub manufacturer_data: Vec<u8>,
    pub adv_types: BTreeSet<AdvType>,
    pub first_seen: SystemTime,
    pub last_seen: SystemTime,
    pub packet_count: u64,
}

impl DeviceRecord {
    fn first_sample(
        address: MacAddress,
        address_type: AddressType,
        rssi: i8,
        timestamp: SystemTime,
    ) -> Self {
        DeviceRecord {
            address,
            address_type,
            name: None,
            manufacturer: lookup::oui_vendor(&address),
            rssi_min: rssi,
            rssi_max: rssi,
            rssi_avg: f64::from(rssi),
            tx_power: None,
            appearance: None,
            services: Vec::new(),
            company_id: None,
            flags: None,
            manufacturer_data: Vec::new(),
            adv_types: BTreeSet::new(),
            first_seen: timestamp,
            last_seen: timestamp,
            packet_count: 1,
        }
    }

    fn add_sample(&mut self, rssi: i8, timestamp: SystemTime) {
        self.packet_count += 1;
        self.rssi_min = self.rssi_min.min(rssi);
        self.rssi_max = self.rssi_max.max(rssi);
        self.rssi_avg += (f64::from(rssi) - self.rssi_avg) / self.packet_count as f64;
        self.last_seen = timestamp;
    }

    /// Merge decoded fields; absent values never clear known ones.
    fn merge_fields(&mut self, address_type: AddressType, adv_type: AdvType, fields: &AdFields) {
        self.address_type = address_type;
        self.adv_types.insert(adv_type);

        if fields.has_name() {
            self.name = Some(fields.name().into_owned());
        }
        if let Some(tx_power) = fields.tx_power() {
            self.tx_power = Some(tx_power);
        }
        if let Some(appearance) = fields.appearance() {
            self.appearance = Some(appearance);
        }
        if let Some(flags) = fields.flags() {
            self.flags = Some(flags);
        }
        if let Some(company_id) = fields.company_id() {
            self.company_id = Some(company_id);
            self.manufacturer_data = fields.manufacturer_data().to_vec();
        }
        for uuid in fields.service_uuids() {
            if !self.services.contains(uuid) {
                self.services.push(*uuid);
            }
        }
    }

    pub fn company_name(&self) -> Option<&'static str> {
        self.company_id.and_then(lookup::company_name)
    }

    pub fn service_names(&self) -> Vec<String> {
        self.services
            .iter()
            .map(|uuid| lookup::service_name_or_hex(*uuid))
            .collect()
    }

    pub fn appearance_name(&self) -> Option<String> {
        self.appearance.map(lookup::appearance_name_or_hex)
    }

    pub fn adv_type_names(&self) -> Vec<String> {
        self.adv_types.iter().map(ToString::to_string).collect()
    }
}

/// Address-keyed device table.
#[derive(Debug, Default)]
pub struct DeviceAggregator {
    devices: HashMap<MacAddress, DeviceRecord>,
}

impl DeviceAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one advertisement into the record for `address`, creating it on
    /// first sight.
    pub fn observe(
        &mut self,
        address: MacAddress,
        address_type: AddressType,
        fields: &AdFields,
        rssi: i8,
        adv_type: AdvType,
        timestamp: SystemTime,
    ) -> &DeviceRecord {
        let record = match self.devices.entry(address) {
            Entry::Occupied(entry) => {
                let record = entry.into_mut();
                record.add_sample(rssi, timestamp);
                record
            }
            Entry::Vacant(entry) => entry.insert(DeviceRecord::first_sample(
                address,
                address_type,
                rssi,
                timestamp,
            )),
        };
        record.merge_fields(address_type, adv_type, fields);
        record
    }

    pub fn get(&self, address: &MacAddress) -> Option<&DeviceRecord> {
        self.devices.get(address)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Devices by descending packet count, ties broken by address.
    pub fn sorted(&self) -> Vec<&DeviceRecord> {
        let mut devices: Vec<_> = self.devices.values().collect();
        devices.sort_by(|a, b| {
            b.packet_count
                .cmp(&a.packet_count)
                .then_with(|| a.address.cmp(&b.address))
        });
        devices
    }
}

/// Upstream packet filter.
///
/// Packets rejected here are never recorded anywhere in the session.
#[derive(Debug, Clone, Default)]
pub struct PacketFilter {
    mac: Option<MacAddress>,
    name: Option<String>,
    min_rssi: Option<i8>,
}

impl PacketFilter {
    pub fn new(mac: Option<MacAddress>, name: Option<&str>, min_rssi: Option<i8>) -> Self {
        PacketFilter {
            mac,
            name: name.map(str::to_lowercase),
            min_rssi,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.mac.is_none() && self.name.is_none() && self.min_rssi.is_none()
    }

    /// Check one packet.
    ///
    /// A packet without an address fails an address filter, and a packet
    /// without a name fails a name filter. The RSSI threshold only applies
    /// when the packet carries an RSSI.
    pub fn matches(
        &self,
        address: Option<&MacAddress>,
        name: Option<&str>,
        rssi: Option<i8>,
    ) -> bool {
        if let Some(wanted) = &self.mac
            && address != Some(wanted)
        {
            return false;
        }
        if let Some(needle) = &self.name
            && !name.is_some_and(|n| n.to_lowercase().contains(needle.as_str()))
        {
            return false;
        }
        if let (Some(min), Some(rssi)) = (self.min_rssi, rssi)
            && rssi < min
        {
            return false;
        }
        true
    }
}
