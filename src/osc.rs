use anyhow::Result;
use nalgebra::Vector3;
use rosc::{encoder, OscBundle, OscMessage, OscPacket, OscTime, OscType};
use std::net::UdpSocket;

use crate::avatar::{JointVisual, RigPose};

pub const OSC_DEFAULT_ADDR: &str = "127.0.0.1:39570";

pub const JOINT_ADDR: &str = "/rig/joint";
pub const ROOT_ADDR: &str = "/rig/root";

/// 引数: name, x, y, z, visible(0/1)
pub fn build_joint_message(joint: &JointVisual) -> OscMessage {
    OscMessage {
        addr: JOINT_ADDR.to_string(),
        args: vec![
            OscType::String(joint.name.as_str().to_string()),
            OscType::Float(joint.position.x),
            OscType::Float(joint.position.y),
            OscType::Float(joint.position.z),
            OscType::Int(joint.visible as i32),
        ],
    }
}

/// 引数: x, y, z, tracked(0/1)
pub fn build_root_message(root: &Vector3<f32>, tracked: bool) -> OscMessage {
    OscMessage {
        addr: ROOT_ADDR.to_string(),
        args: vec![
            OscType::Float(root.x),
            OscType::Float(root.y),
            OscType::Float(root.z),
            OscType::Int(tracked as i32),
        ],
    }
}

/// ルート + 全関節を1バンドルにまとめてエンコード
pub fn encode_pose(pose: &RigPose) -> Result<Vec<u8>> {
    let mut content = Vec::with_capacity(pose.joints().len() + 1);
    content.push(OscPacket::Message(build_root_message(&pose.root, pose.tracked)));
    content.extend(
        pose.joints()
            .iter()
            .map(|j| OscPacket::Message(build_joint_message(j))),
    );
    let packet = OscPacket::Bundle(OscBundle {
        // (0, 1) = 即時
        timetag: OscTime {
            seconds: 0,
            fractional: 1,
        },
        content,
    });
    let encoded = encoder::encode(&packet)?;
    Ok(encoded)
}

/// 表示ポーズをUDPで転送する
pub struct OscSink {
    socket: UdpSocket,
    target_addr: String,
}

impl OscSink {
    pub fn new(target_addr: &str) -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        Ok(Self {
            socket,
            target_addr: target_addr.to_string(),
        })
    }

    pub fn target_addr(&self) -> &str {
        &self.target_addr
    }

    pub fn send_pose(&self, pose: &RigPose) -> Result<()> {
        let data = encode_pose(pose)?;
        self.socket.send_to(&data, &self.target_addr)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rig::{JointName, Rig};
    use rosc::decoder;

    #[test]
    fn test_build_joint_message_args() {
        let joint = JointVisual {
            name: JointName::LeftKnee,
            position: Vector3::new(1.0, 2.0, 3.0),
            visible: true,
        };
        let msg = build_joint_message(&joint);
        assert_eq!(msg.addr, "/rig/joint");
        assert_eq!(msg.args.len(), 5);
        assert_eq!(msg.args[0], OscType::String("leftKnee".to_string()));
        assert_eq!(msg.args[1], OscType::Float(1.0));
        assert_eq!(msg.args[2], OscType::Float(2.0));
        assert_eq!(msg.args[3], OscType::Float(3.0));
        assert_eq!(msg.args[4], OscType::Int(1));
    }

    #[test]
    fn test_build_root_message_untracked() {
        let msg = build_root_message(&Vector3::new(0.0, 1.6, 0.0), false);
        assert_eq!(msg.addr, "/rig/root");
        assert_eq!(msg.args[1], OscType::Float(1.6));
        assert_eq!(msg.args[3], OscType::Int(0));
    }

    #[test]
    fn test_encode_pose_bundle() {
        let rig = Rig::new(&[JointName::Head, JointName::Pelvis]);
        let pose = RigPose::from_rig(&rig, Vector3::new(0.0, 1.6, 0.0));
        let encoded = encode_pose(&pose).unwrap();

        let (_, packet) = decoder::decode_udp(&encoded).unwrap();
        match packet {
            OscPacket::Bundle(bundle) => assert_eq!(bundle.content.len(), 3),
            OscPacket::Message(_) => panic!("expected bundle"),
        }
    }
}
