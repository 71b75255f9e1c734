// 该文件是 Zhijian （质检） 项目的一部分。
// tests/common/mod.rs - 本地一次性 HTTP 应答器
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Zhijian Contributors

#![allow(dead_code)]

use std::{
  io::{Read, Write},
  net::{TcpListener, TcpStream},
  thread::{self, JoinHandle},
};

use url::Url;

/// 应答器收到的一次请求
pub struct Recorded {
  pub head: String,
  pub body: Vec<u8>,
}

impl Recorded {
  pub fn request_line(&self) -> &str {
    self.head.lines().next().unwrap_or("")
  }

  pub fn body_contains(&self, needle: &[u8]) -> bool {
    self.body.windows(needle.len()).any(|w| w == needle)
  }
}

/// 依次应答若干个连接，每个连接返回一条预设的响应后关闭
pub fn serve(responses: Vec<(u16, String)>) -> (Url, JoinHandle<Vec<Recorded>>) {
  let listener = TcpListener::bind("127.0.0.1:0").unwrap();
  let port = listener.local_addr().unwrap().port();
  let handle = thread::spawn(move || {
    let mut recorded = Vec::new();
    for (status, body) in responses {
      let (mut stream, _) = listener.accept().unwrap();
      recorded.push(read_request(&mut stream));
      let response = format!(
        "HTTP/1.1 {status} Test\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
      );
      stream.write_all(response.as_bytes()).unwrap();
      stream.flush().unwrap();
    }
    recorded
  });
  let endpoint = Url::parse(&format!("http://127.0.0.1:{port}/")).unwrap();
  (endpoint, handle)
}

pub fn serve_once(status: u16, body: &str) -> (Url, JoinHandle<Vec<Recorded>>) {
  serve(vec![(status, body.to_string())])
}

/// 返回一个没有监听者的本地地址
pub fn refused_endpoint() -> Url {
  let listener = TcpListener::bind("127.0.0.1:0").unwrap();
  let port = listener.local_addr().unwrap().port();
  drop(listener);
  Url::parse(&format!("http://127.0.0.1:{port}/")).unwrap()
}

fn read_request(stream: &mut TcpStream) -> Recorded {
  let mut buffer = Vec::new();
  let mut chunk = [0u8; 4096];

  let head_end = loop {
    let n = stream.read(&mut chunk).unwrap();
    assert!(n > 0, "connection closed before request head");
    buffer.extend_from_slice(&chunk[..n]);
    if let Some(pos) = find(&buffer, b"\r\n\r\n") {
      break pos + 4;
    }
  };

  let head = String::from_utf8_lossy(&buffer[..head_end]).to_string();
  let content_length = head.lines().find_map(|line| {
    let (name, value) = line.split_once(':')?;
    name
      .eq_ignore_ascii_case("content-length")
      .then(|| value.trim().parse::<usize>().ok())
      .flatten()
  });

  let mut body = buffer[head_end..].to_vec();
  match content_length {
    Some(length) => {
      while body.len() < length {
        let n = stream.read(&mut chunk).unwrap();
        if n == 0 {
          break;
        }
        body.extend_from_slice(&chunk[..n]);
      }
    }
    None => {
      while !body.ends_with(b"0\r\n\r\n") {
        let n = stream.read(&mut chunk).unwrap();
        if n == 0 {
          break;
        }
        body.extend_from_slice(&chunk[..n]);
      }
    }
  }

  Recorded { head, body }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
  haystack.windows(needle.len()).position(|w| w == needle)
}
