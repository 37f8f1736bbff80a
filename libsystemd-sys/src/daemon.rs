use super::c_int;

/// Number of the first passed file descriptor (`SD_LISTEN_FDS_START`).
pub const SD_LISTEN_FDS_START: c_int = 3;

extern "C" {
    pub fn sd_listen_fds(unset_environment: c_int) -> c_int;
    pub fn sd_is_socket_inet(
        fd: c_int,
        family: c_int,
        sock_type: c_int,
        listening: c_int,
        port: u16,
    ) -> c_int;
}
