pub mod employee_repo;
pub use employee_repo::EmployeeRepository;
pub mod hospital_repo;
pub use hospital_repo::HospitalRepository;
pub mod room_repo;
pub use room_repo::RoomRepository;
pub mod message_repo;
pub use message_repo::MessageRepository;
pub mod notification_repo;
pub use notification_repo::NotificationRepository;
