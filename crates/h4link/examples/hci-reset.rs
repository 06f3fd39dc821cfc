//! Send HCI Reset to a controller and print the events that come back.
//!
//! ```text
//! cargo run -p h4link --example hci-reset -- /dev/ttyUSB0 115200
//! ```

#[cfg(unix)]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::time::{Duration, Instant};

    use h4link::frame::HCI_EVENT_TRANSPORT_PACKET_SENT;
    use h4link::transport::PacketQueue;
    use h4link::uart::PosixUart;
    use h4link::{H4Transport, OutgoingPacket, PacketType, TransportConfig, UartTransportConfig};

    const HCI_RESET: u16 = 0x0C03;
    const COMMAND_COMPLETE: u8 = 0x0E;

    let mut args = std::env::args().skip(1);
    let device = args.next().ok_or("usage: hci-reset DEVICE [BAUD]")?;
    let baudrate = match args.next() {
        Some(baud) => baud.parse()?,
        None => h4link::uart::DEFAULT_BAUDRATE,
    };

    let mut transport = H4Transport::new(PosixUart::new());
    transport.init(&TransportConfig::Uart(
        UartTransportConfig::new(device).with_baudrate(baudrate),
    ))?;
    let queue = PacketQueue::new();
    transport.register_packet_handler(queue.clone());
    transport.open()?;

    transport.send_packet(PacketType::Command, OutgoingPacket::command(HCI_RESET, &[])?)?;

    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        transport.poll()?;
        while let Some(packet) = queue.pop() {
            match packet.data.first() {
                Some(&HCI_EVENT_TRANSPORT_PACKET_SENT) => println!("reset sent"),
                Some(&COMMAND_COMPLETE) => {
                    println!("command complete: {:02x?}", &packet.data[..]);
                    transport.close()?;
                    return Ok(());
                }
                _ => println!("{}: {:02x?}", packet.packet_type, &packet.data[..]),
            }
        }
    }

    transport.close()?;
    Err("no command complete within 2s".into())
}

#[cfg(not(unix))]
fn main() {
    eprintln!("hci-reset needs a POSIX serial device");
}
