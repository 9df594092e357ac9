mod pcap;

pub use pcap::*;
